// ABOUTME: Deployment request types, one per strategy step, plus the dispatch enum.
// ABOUTME: Blue/green steps thread BlueGreenRollbackData through instead of re-reading the cluster.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cluster::{
    ClientKey, CredentialsHandle, ScalableTargetSpec, ScalingPolicySpec, ServiceSpec,
    TaskDefinitionSpec,
};
use crate::config::{DeployManifest, PollSettings, StrategyConfig};
use crate::types::{ListenerArn, ListenerRuleArn, TargetGroupArn};

use super::snapshot::RollbackSnapshot;

/// Where a deployment lands: one cluster, reached through one region and one
/// set of credentials.
#[derive(Debug, Clone)]
pub struct ClusterTarget {
    pub cluster: String,
    pub region: String,
    pub credentials: CredentialsHandle,
}

impl ClusterTarget {
    pub fn new(
        cluster: impl Into<String>,
        region: impl Into<String>,
        credentials: CredentialsHandle,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            region: region.into(),
            credentials,
        }
    }

    pub fn client_key(&self) -> ClientKey {
        ClientKey::new(self.region.clone(), self.credentials.clone())
    }
}

/// A listener plus the rule on it that the deployment manages.
/// `rule: None` means the listener's default rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerBinding {
    pub listener: ListenerArn,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<ListenerRuleArn>,
}

/// State threaded through the blue/green steps so a rollback never has to
/// reconstruct what prepare observed.
///
/// `first_deployment` and `target_shift_started` are written by the prepare
/// and swap steps and consumed verbatim by rollback; rollback never
/// recomputes them from live cluster state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueGreenRollbackData {
    /// Logical service name the versioned names derive from.
    pub base_name: String,

    /// Versioned name of the service that was live when prepare ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_service_name: Option<String>,

    /// Desired state of the blue service at prepare time, serialized to YAML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_service: Option<String>,

    /// The blue service's scalable targets at prepare time, each serialized
    /// to YAML, in capture order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blue_scalable_targets: Vec<String>,

    /// The blue service's scaling policies at prepare time, each serialized
    /// to YAML, in capture order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blue_scaling_policies: Vec<String>,

    /// Versioned name the create step gave the new (green) service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_service_name: Option<String>,

    pub first_deployment: bool,

    /// True once the swap step has touched a listener rule.
    pub target_shift_started: bool,

    pub prod: ListenerBinding,
    pub stage: ListenerBinding,

    pub prod_target_group: TargetGroupArn,
    pub stage_target_group: TargetGroupArn,
}

/// Rolling deploy: update the existing service in place.
#[derive(Debug, Clone)]
pub struct RollingDeploy {
    pub target: ClusterTarget,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub scalable_targets: Vec<ScalableTargetSpec>,
    pub scaling_policies: Vec<ScalingPolicySpec>,
    pub same_as_running: bool,
    pub force_new_deployment: bool,
    pub poll: PollSettings,
}

/// Canary deploy: a small sidecar service under a derived name.
#[derive(Debug, Clone)]
pub struct CanaryDeploy {
    pub target: ClusterTarget,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub suffix: String,
    pub count: i64,
    pub poll: PollSettings,
}

/// Tear the canary service down again.
#[derive(Debug, Clone)]
pub struct CanaryDelete {
    pub target: ClusterTarget,
    pub base_name: String,
    pub suffix: String,
    pub poll: PollSettings,
}

/// First blue/green step: record what is live and resolve target groups.
#[derive(Debug, Clone)]
pub struct BlueGreenPrepareRollback {
    pub target: ClusterTarget,
    pub base_name: String,
    pub prod: ListenerBinding,
    pub stage: ListenerBinding,
}

/// Second blue/green step: stand the new version up behind the stage
/// target group.
#[derive(Debug, Clone)]
pub struct BlueGreenCreateService {
    pub target: ClusterTarget,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub scalable_targets: Vec<ScalableTargetSpec>,
    pub scaling_policies: Vec<ScalingPolicySpec>,
    pub rollback_data: BlueGreenRollbackData,
    pub poll: PollSettings,
}

/// Third blue/green step: swap prod and stage listener rules.
#[derive(Debug, Clone)]
pub struct BlueGreenSwapTargetGroups {
    pub target: ClusterTarget,
    pub rollback_data: BlueGreenRollbackData,
    pub keep_old_service_scaled: bool,
    pub downsize_delay: Option<Duration>,
    pub poll: PollSettings,
}

/// Undo a failed blue/green deployment.
#[derive(Debug, Clone)]
pub struct BlueGreenRollback {
    pub target: ClusterTarget,
    pub rollback_data: BlueGreenRollbackData,
    pub poll: PollSettings,
}

/// Basic deploy: create the new version under the free versioned name and
/// park the old one at zero.
#[derive(Debug, Clone)]
pub struct BasicCreate {
    pub target: ClusterTarget,
    pub service: ServiceSpec,
    pub task_definition: TaskDefinitionSpec,
    pub poll: PollSettings,
}

/// Undo a basic deploy: drop the new service, restore the old one from the
/// snapshot the caller captured before deploying.
#[derive(Debug, Clone)]
pub struct BasicRollback {
    pub target: ClusterTarget,
    pub new_service_name: String,
    pub snapshot: RollbackSnapshot,
    pub poll: PollSettings,
}

/// Restore a service to a previously captured snapshot. When the snapshot
/// records a first deployment, restoring means deleting what was created.
#[derive(Debug, Clone)]
pub struct RollbackRequest {
    pub target: ClusterTarget,
    pub snapshot: RollbackSnapshot,
    pub poll: PollSettings,
}

/// Launch one-off tasks and optionally wait for them to stop.
#[derive(Debug, Clone)]
pub struct RunTask {
    pub target: ClusterTarget,
    pub task_definition: TaskDefinitionSpec,
    pub count: i64,
    pub group: Option<String>,
    pub launch_type: Option<String>,
    pub skip_wait: bool,
    pub poll: PollSettings,
}

/// Every deployment operation, tagged by strategy step. Dispatch is an
/// exhaustive match; a request cannot reach the wrong executor.
#[derive(Debug, Clone)]
pub enum DeployRequest {
    Rolling(RollingDeploy),
    CanaryDeploy(CanaryDeploy),
    CanaryDelete(CanaryDelete),
    BlueGreenPrepareRollback(BlueGreenPrepareRollback),
    BlueGreenCreateService(BlueGreenCreateService),
    BlueGreenSwapTargetGroups(BlueGreenSwapTargetGroups),
    BlueGreenRollback(BlueGreenRollback),
    BasicCreate(BasicCreate),
    BasicRollback(BasicRollback),
    RunTask(RunTask),
}

impl DeployRequest {
    pub fn target(&self) -> &ClusterTarget {
        match self {
            DeployRequest::Rolling(r) => &r.target,
            DeployRequest::CanaryDeploy(r) => &r.target,
            DeployRequest::CanaryDelete(r) => &r.target,
            DeployRequest::BlueGreenPrepareRollback(r) => &r.target,
            DeployRequest::BlueGreenCreateService(r) => &r.target,
            DeployRequest::BlueGreenSwapTargetGroups(r) => &r.target,
            DeployRequest::BlueGreenRollback(r) => &r.target,
            DeployRequest::BasicCreate(r) => &r.target,
            DeployRequest::BasicRollback(r) => &r.target,
            DeployRequest::RunTask(r) => &r.target,
        }
    }

    /// Build the entry request for a manifest's strategy: rolling and basic
    /// map to their single deploy step, canary to the canary deploy, and
    /// blue/green to the prepare step (create and swap need the prepare
    /// step's output, see the dedicated constructors).
    pub fn from_manifest(manifest: &DeployManifest, credentials: CredentialsHandle) -> Self {
        let target = ClusterTarget::new(&manifest.cluster, &manifest.region, credentials);
        match &manifest.strategy {
            StrategyConfig::Rolling {
                same_as_running,
                force_new_deployment,
            } => DeployRequest::Rolling(RollingDeploy {
                target,
                service: manifest.service.clone(),
                task_definition: manifest.task_definition.clone(),
                scalable_targets: manifest.scalable_targets.clone(),
                scaling_policies: manifest.scaling_policies.clone(),
                same_as_running: *same_as_running,
                force_new_deployment: *force_new_deployment,
                poll: manifest.poll,
            }),
            StrategyConfig::Canary { suffix, count } => DeployRequest::CanaryDeploy(CanaryDeploy {
                target,
                service: manifest.service.clone(),
                task_definition: manifest.task_definition.clone(),
                suffix: suffix.clone(),
                count: *count,
                poll: manifest.poll,
            }),
            StrategyConfig::BlueGreen {
                prod_listener,
                prod_listener_rule,
                stage_listener,
                stage_listener_rule,
                ..
            } => DeployRequest::BlueGreenPrepareRollback(BlueGreenPrepareRollback {
                target,
                base_name: manifest.service.service_name.clone(),
                prod: ListenerBinding {
                    listener: prod_listener.clone(),
                    rule: prod_listener_rule.clone(),
                },
                stage: ListenerBinding {
                    listener: stage_listener.clone(),
                    rule: stage_listener_rule.clone(),
                },
            }),
            StrategyConfig::Basic => DeployRequest::BasicCreate(BasicCreate {
                target,
                service: manifest.service.clone(),
                task_definition: manifest.task_definition.clone(),
                poll: manifest.poll,
            }),
        }
    }
}

impl BlueGreenCreateService {
    /// Follow-on constructor for the second blue/green step, fed with the
    /// prepare step's rollback data.
    pub fn from_manifest(
        manifest: &DeployManifest,
        credentials: CredentialsHandle,
        rollback_data: BlueGreenRollbackData,
    ) -> Self {
        Self {
            target: ClusterTarget::new(&manifest.cluster, &manifest.region, credentials),
            service: manifest.service.clone(),
            task_definition: manifest.task_definition.clone(),
            scalable_targets: manifest.scalable_targets.clone(),
            scaling_policies: manifest.scaling_policies.clone(),
            rollback_data,
            poll: manifest.poll,
        }
    }
}

impl BlueGreenSwapTargetGroups {
    /// Follow-on constructor for the third blue/green step.
    pub fn from_manifest(
        manifest: &DeployManifest,
        credentials: CredentialsHandle,
        rollback_data: BlueGreenRollbackData,
    ) -> Self {
        let (keep_old_service_scaled, downsize_delay) = match &manifest.strategy {
            StrategyConfig::BlueGreen {
                keep_old_service_scaled,
                downsize_delay,
                ..
            } => (*keep_old_service_scaled, *downsize_delay),
            _ => (false, None),
        };
        Self {
            target: ClusterTarget::new(&manifest.cluster, &manifest.region, credentials),
            rollback_data,
            keep_old_service_scaled,
            downsize_delay,
            poll: manifest.poll,
        }
    }
}
