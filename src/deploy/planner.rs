// ABOUTME: Pure planning: validate a request and normalize it into an intent.
// ABOUTME: No I/O and no clocks; everything here is decided from the request alone.

use crate::cluster::{ScalableTargetSpec, ScalingPolicySpec, ServiceSpec, TaskDefinitionSpec};
use crate::config::PollSettings;
use crate::types::ServiceName;

use super::error::DeployError;
use super::naming;
use super::request::{
    BasicCreate, BasicRollback, BlueGreenCreateService, BlueGreenPrepareRollback,
    BlueGreenRollback, BlueGreenRollbackData, BlueGreenSwapTargetGroups, CanaryDelete,
    CanaryDeploy, DeployRequest, ListenerBinding, RollingDeploy, RunTask,
};
use super::snapshot::RollbackSnapshot;

/// A validated, normalized plan for one deployment step. Executors consume
/// intents, never raw requests, so every execution path starts from checked
/// input.
#[derive(Debug, Clone)]
pub enum DeploymentIntent {
    Rolling(RollingIntent),
    CanaryDeploy(CanaryDeployIntent),
    CanaryDelete(CanaryDeleteIntent),
    BlueGreenPrepareRollback(BlueGreenPrepareIntent),
    BlueGreenCreateService(BlueGreenCreateIntent),
    BlueGreenSwapTargetGroups(BlueGreenSwapIntent),
    BlueGreenRollback(BlueGreenRollbackIntent),
    BasicCreate(BasicCreateIntent),
    BasicRollback(BasicRollbackIntent),
    RunTask(RunTaskIntent),
}

#[derive(Debug, Clone)]
pub struct RollingIntent {
    pub service_name: ServiceName,
    pub cluster: String,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub scalable_targets: Vec<ScalableTargetSpec>,
    pub scaling_policies: Vec<ScalingPolicySpec>,
    pub same_as_running: bool,
    pub force_new_deployment: bool,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct CanaryDeployIntent {
    /// Derived canary name: base and suffix concatenated.
    pub service_name: ServiceName,
    pub cluster: String,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct CanaryDeleteIntent {
    pub service_name: ServiceName,
    pub cluster: String,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct BlueGreenPrepareIntent {
    pub base_name: ServiceName,
    pub cluster: String,
    pub prod: ListenerBinding,
    pub stage: ListenerBinding,
}

#[derive(Debug, Clone)]
pub struct BlueGreenCreateIntent {
    /// Stage name: the versioned slot the blue service does not occupy.
    pub service_name: ServiceName,
    pub cluster: String,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub scalable_targets: Vec<ScalableTargetSpec>,
    pub scaling_policies: Vec<ScalingPolicySpec>,
    pub rollback_data: BlueGreenRollbackData,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct BlueGreenSwapIntent {
    pub cluster: String,
    pub rollback_data: BlueGreenRollbackData,
    pub keep_old_service_scaled: bool,
    pub downsize_delay: Option<std::time::Duration>,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct BlueGreenRollbackIntent {
    pub cluster: String,
    pub rollback_data: BlueGreenRollbackData,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct BasicCreateIntent {
    pub base_name: ServiceName,
    pub cluster: String,
    /// The two fixed versioned names; the executor picks whichever is free.
    pub version_one: String,
    pub version_two: String,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct BasicRollbackIntent {
    pub new_service_name: ServiceName,
    pub cluster: String,
    pub snapshot: RollbackSnapshot,
    pub poll: PollSettings,
}

#[derive(Debug, Clone)]
pub struct RunTaskIntent {
    pub cluster: String,
    pub task_definition: TaskDefinitionSpec,
    pub count: i64,
    pub group: Option<String>,
    pub launch_type: Option<String>,
    pub skip_wait: bool,
    pub poll: PollSettings,
}

/// Validate and normalize a request. Fails fast on structural problems so no
/// executor ever starts work it cannot finish.
pub fn plan(request: &DeployRequest) -> Result<DeploymentIntent, DeployError> {
    match request {
        DeployRequest::Rolling(r) => plan_rolling(r).map(DeploymentIntent::Rolling),
        DeployRequest::CanaryDeploy(r) => plan_canary_deploy(r).map(DeploymentIntent::CanaryDeploy),
        DeployRequest::CanaryDelete(r) => plan_canary_delete(r).map(DeploymentIntent::CanaryDelete),
        DeployRequest::BlueGreenPrepareRollback(r) => {
            plan_blue_green_prepare(r).map(DeploymentIntent::BlueGreenPrepareRollback)
        }
        DeployRequest::BlueGreenCreateService(r) => {
            plan_blue_green_create(r).map(DeploymentIntent::BlueGreenCreateService)
        }
        DeployRequest::BlueGreenSwapTargetGroups(r) => {
            plan_blue_green_swap(r).map(DeploymentIntent::BlueGreenSwapTargetGroups)
        }
        DeployRequest::BlueGreenRollback(r) => {
            plan_blue_green_rollback(r).map(DeploymentIntent::BlueGreenRollback)
        }
        DeployRequest::BasicCreate(r) => plan_basic_create(r).map(DeploymentIntent::BasicCreate),
        DeployRequest::BasicRollback(r) => {
            plan_basic_rollback(r).map(DeploymentIntent::BasicRollback)
        }
        DeployRequest::RunTask(r) => plan_run_task(r).map(DeploymentIntent::RunTask),
    }
}

fn plan_rolling(request: &RollingDeploy) -> Result<RollingIntent, DeployError> {
    let service_name = validated_name(&request.service.service_name)?;
    validate_desired_count(request.service.desired_count)?;
    validate_task_definition(&request.task_definition)?;
    let service = normalized_spec(
        request.service.clone(),
        &request.target.cluster,
        service_name.as_str(),
    )?;

    Ok(RollingIntent {
        service_name,
        cluster: request.target.cluster.clone(),
        service,
        task_definition: request.task_definition.clone(),
        scalable_targets: request.scalable_targets.clone(),
        scaling_policies: request.scaling_policies.clone(),
        same_as_running: request.same_as_running,
        force_new_deployment: request.force_new_deployment,
        poll: request.poll,
    })
}

fn plan_canary_deploy(request: &CanaryDeploy) -> Result<CanaryDeployIntent, DeployError> {
    validated_name(&request.service.service_name)?;
    validate_task_definition(&request.task_definition)?;
    if request.suffix.is_empty() {
        return Err(DeployError::validation("canary suffix cannot be empty"));
    }
    if request.count <= 0 {
        return Err(DeployError::validation(format!(
            "canary count must be positive, got {}",
            request.count
        )));
    }

    let canary_name =
        naming::canary_service_name(&request.service.service_name, &request.suffix);
    let service_name = validated_name(&canary_name)?;
    let mut service = normalized_spec(
        request.service.clone(),
        &request.target.cluster,
        service_name.as_str(),
    )?;
    service.desired_count = request.count;

    Ok(CanaryDeployIntent {
        service_name,
        cluster: request.target.cluster.clone(),
        service,
        task_definition: request.task_definition.clone(),
        poll: request.poll,
    })
}

fn plan_canary_delete(request: &CanaryDelete) -> Result<CanaryDeleteIntent, DeployError> {
    validated_name(&request.base_name)?;
    if request.suffix.is_empty() {
        return Err(DeployError::validation("canary suffix cannot be empty"));
    }
    let canary_name = naming::canary_service_name(&request.base_name, &request.suffix);

    Ok(CanaryDeleteIntent {
        service_name: validated_name(&canary_name)?,
        cluster: request.target.cluster.clone(),
        poll: request.poll,
    })
}

fn plan_blue_green_prepare(
    request: &BlueGreenPrepareRollback,
) -> Result<BlueGreenPrepareIntent, DeployError> {
    Ok(BlueGreenPrepareIntent {
        base_name: validated_name(&request.base_name)?,
        cluster: request.target.cluster.clone(),
        prod: request.prod.clone(),
        stage: request.stage.clone(),
    })
}

fn plan_blue_green_create(
    request: &BlueGreenCreateService,
) -> Result<BlueGreenCreateIntent, DeployError> {
    let base = validated_name(&request.service.service_name)?;
    validate_desired_count(request.service.desired_count)?;
    validate_task_definition(&request.task_definition)?;

    let stage_name = naming::stage_service_name(
        base.as_str(),
        request.rollback_data.blue_service_name.as_deref(),
    );
    let service_name = validated_name(&stage_name)?;

    let mut service = normalized_spec(
        request.service.clone(),
        &request.target.cluster,
        service_name.as_str(),
    )?;
    service = service.with_target_group(&request.rollback_data.stage_target_group);
    service.tags.insert(
        naming::VERSION_TAG_KEY.to_string(),
        naming::VERSION_GREEN.to_string(),
    );

    Ok(BlueGreenCreateIntent {
        service_name,
        cluster: request.target.cluster.clone(),
        service,
        task_definition: request.task_definition.clone(),
        scalable_targets: request.scalable_targets.clone(),
        scaling_policies: request.scaling_policies.clone(),
        rollback_data: request.rollback_data.clone(),
        poll: request.poll,
    })
}

fn plan_blue_green_swap(
    request: &BlueGreenSwapTargetGroups,
) -> Result<BlueGreenSwapIntent, DeployError> {
    if request.rollback_data.new_service_name.is_none() {
        return Err(DeployError::validation(
            "cannot swap target groups before the stage service exists",
        ));
    }

    Ok(BlueGreenSwapIntent {
        cluster: request.target.cluster.clone(),
        rollback_data: request.rollback_data.clone(),
        keep_old_service_scaled: request.keep_old_service_scaled,
        downsize_delay: request.downsize_delay,
        poll: request.poll,
    })
}

fn plan_blue_green_rollback(
    request: &BlueGreenRollback,
) -> Result<BlueGreenRollbackIntent, DeployError> {
    validated_name(&request.rollback_data.base_name)?;

    Ok(BlueGreenRollbackIntent {
        cluster: request.target.cluster.clone(),
        rollback_data: request.rollback_data.clone(),
        poll: request.poll,
    })
}

fn plan_basic_create(request: &BasicCreate) -> Result<BasicCreateIntent, DeployError> {
    let base_name = validated_name(&request.service.service_name)?;
    validate_desired_count(request.service.desired_count)?;
    validate_task_definition(&request.task_definition)?;
    let service = normalized_spec(
        request.service.clone(),
        &request.target.cluster,
        base_name.as_str(),
    )?;

    Ok(BasicCreateIntent {
        version_one: naming::versioned(base_name.as_str(), 1),
        version_two: naming::versioned(base_name.as_str(), 2),
        base_name,
        cluster: request.target.cluster.clone(),
        service,
        task_definition: request.task_definition.clone(),
        poll: request.poll,
    })
}

fn plan_basic_rollback(request: &BasicRollback) -> Result<BasicRollbackIntent, DeployError> {
    let new_service_name = validated_name(&request.new_service_name)?;
    if request.snapshot.cluster != request.target.cluster {
        return Err(DeployError::validation(format!(
            "snapshot was captured in cluster {}, request targets {}",
            request.snapshot.cluster, request.target.cluster
        )));
    }

    Ok(BasicRollbackIntent {
        new_service_name,
        cluster: request.target.cluster.clone(),
        snapshot: request.snapshot.clone(),
        poll: request.poll,
    })
}

fn plan_run_task(request: &RunTask) -> Result<RunTaskIntent, DeployError> {
    validate_task_definition(&request.task_definition)?;
    if request.count <= 0 {
        return Err(DeployError::validation(format!(
            "task count must be positive, got {}",
            request.count
        )));
    }

    Ok(RunTaskIntent {
        cluster: request.target.cluster.clone(),
        task_definition: request.task_definition.clone(),
        count: request.count,
        group: request.group.clone(),
        launch_type: request.launch_type.clone(),
        skip_wait: request.skip_wait,
        poll: request.poll,
    })
}

fn validated_name(raw: &str) -> Result<ServiceName, DeployError> {
    ServiceName::new(raw).map_err(|e| DeployError::validation(format!("service name: {e}")))
}

fn validate_desired_count(count: i64) -> Result<(), DeployError> {
    if count <= 0 {
        return Err(DeployError::validation(format!(
            "desired count must be positive, got {count}"
        )));
    }
    Ok(())
}

fn validate_task_definition(spec: &TaskDefinitionSpec) -> Result<(), DeployError> {
    if spec.family.is_empty() {
        return Err(DeployError::validation(
            "task definition family cannot be empty",
        ));
    }
    Ok(())
}

/// Pin the spec's name to the resolved name and its cluster to the target's.
/// A manifest naming a different cluster than the request targets is a
/// caller mistake, not something to silently override.
fn normalized_spec(
    mut spec: ServiceSpec,
    cluster: &str,
    service_name: &str,
) -> Result<ServiceSpec, DeployError> {
    if let Some(declared) = spec.cluster.as_deref() {
        if declared != cluster {
            return Err(DeployError::validation(format!(
                "manifest targets cluster {declared}, request targets {cluster}"
            )));
        }
    }
    spec.cluster = Some(cluster.to_string());
    spec.service_name = service_name.to_string();
    Ok(spec)
}

/// Shared by rollback paths: a restore never scales a live service down, so
/// the restored count is the larger of the captured and live counts.
pub(crate) fn restored_desired_count(captured: i64, live: Option<i64>) -> i64 {
    match live {
        Some(live) => captured.max(live),
        None => captured,
    }
}
