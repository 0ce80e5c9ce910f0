// ABOUTME: Blue/green executor: prepare rollback data, create the green service behind
// ABOUTME: the stage rule, swap listener rules, and unwind any of it on rollback.

use tokio_util::sync::CancellationToken;

use crate::cluster::{
    LoadBalancingOps, ScalableTargetSpec, ScalingOps, ScalingPolicySpec, ServiceOps, ServiceSpec,
    ServiceStatus, ServiceUpdate, ServiceView,
};
use crate::config::PollSettings;
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::fold_failure;
use super::naming::{self, VERSION_BLUE, VERSION_GREEN, VERSION_TAG_KEY};
use super::planner::{
    BlueGreenCreateIntent, BlueGreenPrepareIntent, BlueGreenRollbackIntent, BlueGreenSwapIntent,
};
use super::request::BlueGreenRollbackData;
use super::result::DeploymentResult;
use super::service_flow;
use super::snapshot::{self, RollbackSnapshot};
use super::waiter;

/// Records everything a later rollback needs before anything is mutated:
/// which versioned service is live (tagged blue), its desired state and
/// scaling resources, and the target groups the prod and stage rules
/// currently forward to.
pub(crate) async fn prepare_rollback<C>(
    client: &C,
    progress: &dyn ProgressSink,
    intent: &BlueGreenPrepareIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + ScalingOps + LoadBalancingOps,
{
    let base = intent.base_name.as_str();

    let outcome: Result<BlueGreenRollbackData, DeployError> = async {
        let prod_target_group = client
            .target_group_for_rule(&intent.prod.listener, intent.prod.rule.as_ref())
            .await?;
        let stage_target_group = client
            .target_group_for_rule(&intent.stage.listener, intent.stage.rule.as_ref())
            .await?;

        let blue = find_blue_service(client, &intent.cluster, base).await?;
        let (blue_service_name, blue_service, blue_scalable_targets, blue_scaling_policies, first) =
            match blue {
                Some(view) => {
                    progress.progress(&format!("found live service {}", view.service_name));
                    let snapshot = RollbackSnapshot::capture(
                        client,
                        &intent.cluster,
                        &view.service_name,
                        progress,
                    )
                    .await?;
                    (
                        Some(snapshot.service_name),
                        snapshot.service,
                        snapshot.scalable_targets,
                        snapshot.scaling_policies,
                        false,
                    )
                }
                None => {
                    progress.progress(&format!("no live service for {base}, first deployment"));
                    (None, None, Vec::new(), Vec::new(), true)
                }
            };

        Ok(BlueGreenRollbackData {
            base_name: base.to_string(),
            blue_service_name,
            blue_service,
            blue_scalable_targets,
            blue_scaling_policies,
            new_service_name: None,
            first_deployment: first,
            target_shift_started: false,
            prod: intent.prod.clone(),
            stage: intent.stage.clone(),
            prod_target_group,
            stage_target_group,
        })
    }
    .await;

    match outcome {
        Ok(data) => Ok(DeploymentResult::succeeded(base).with_rollback_data(data)),
        Err(err) => fold_failure(base, err),
    }
}

/// Stands the green service up under the free versioned name, pointed at the
/// stage target group, and waits for steady state.
pub(crate) async fn create_service<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &BlueGreenCreateIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let name = intent.service_name.as_str();
    let mut data = intent.rollback_data.clone();
    // Recorded up front so a rollback after a partial create still knows
    // which service it is unwinding.
    data.new_service_name = Some(name.to_string());

    let outcome: Result<String, DeployError> = async {
        let removed = service_flow::delete_service_if_active(
            client,
            progress,
            cancel,
            &intent.cluster,
            name,
            &intent.poll,
        )
        .await?;
        if removed {
            progress.warn(&format!("removed leftover stage service {name}"));
        }

        progress.progress(&format!(
            "registering task definition {}",
            intent.task_definition.family
        ));
        let registered = client
            .register_task_definition(&intent.task_definition)
            .await?;
        let qualified = registered.qualified_name();

        let mut spec = intent.service.clone();
        spec.task_definition = Some(qualified.clone());

        progress.progress(&format!("creating stage service {name}"));
        client.create_service(&spec).await?;
        waiter::await_service_steady(client, &intent.cluster, name, &intent.poll, progress, cancel)
            .await?;
        service_flow::attach_scaling(
            client,
            &intent.cluster,
            name,
            &intent.scalable_targets,
            &intent.scaling_policies,
        )
        .await?;

        progress.progress(&format!("stage service {name} reached steady state"));
        Ok(qualified)
    }
    .await;

    match outcome {
        Ok(task_definition) => Ok(DeploymentResult::succeeded(name)
            .with_task_definition(task_definition)
            .with_rollback_data(data)),
        Err(err) => fold_failure(name, err).map(|result| result.with_rollback_data(data.clone())),
    }
}

/// Swaps production traffic onto the green service: prod rule to the stage
/// target group, stage rule to the old prod target group, then re-tags both
/// services and optionally downsizes the old one.
pub(crate) async fn swap_target_groups<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &BlueGreenSwapIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + LoadBalancingOps,
{
    let Some(new_name) = intent.rollback_data.new_service_name.clone() else {
        return Err(DeployError::validation(
            "swap requires rollback data from the create step",
        ));
    };

    let mut data = intent.rollback_data.clone();
    // Marked before the first listener mutation: if the swap dies between the
    // two rule changes, rollback must still undo the half it completed.
    data.target_shift_started = true;

    let outcome: Result<(), DeployError> = async {
        progress.progress(&format!("shifting production traffic to {new_name}"));
        client
            .modify_listener_rule(
                &data.prod.listener,
                data.prod.rule.as_ref(),
                &data.stage_target_group,
            )
            .await?;
        client
            .modify_listener_rule(
                &data.stage.listener,
                data.stage.rule.as_ref(),
                &data.prod_target_group,
            )
            .await?;

        client
            .tag_service(&intent.cluster, &new_name, VERSION_TAG_KEY, VERSION_BLUE)
            .await?;

        if let Some(old_name) = &data.blue_service_name {
            client
                .tag_service(&intent.cluster, old_name, VERSION_TAG_KEY, VERSION_GREEN)
                .await?;

            if intent.keep_old_service_scaled {
                progress.progress(&format!("keeping old service {old_name} scaled up"));
            } else {
                if let Some(delay) = intent.downsize_delay {
                    if !delay.is_zero() {
                        progress.progress(&format!(
                            "waiting {}s before downsizing {old_name}",
                            delay.as_secs()
                        ));
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                progress.progress(&format!("downsizing old service {old_name} to zero"));
                client
                    .update_service(&ServiceUpdate {
                        cluster: intent.cluster.clone(),
                        service_name: old_name.clone(),
                        desired_count: Some(0),
                        task_definition: None,
                        force_new_deployment: false,
                    })
                    .await?;
                waiter::await_service_steady(
                    client,
                    &intent.cluster,
                    old_name,
                    &intent.poll,
                    progress,
                    cancel,
                )
                .await?;
            }
        }

        progress.progress(&format!("production traffic now served by {new_name}"));
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => Ok(DeploymentResult::succeeded(&new_name).with_rollback_data(data)),
        Err(err) => {
            fold_failure(&new_name, err).map(|result| result.with_rollback_data(data.clone()))
        }
    }
}

/// Unwinds a blue/green deployment. Which pieces need undoing depends on two
/// facts the earlier steps recorded: whether traffic was already shifted and
/// whether there was a blue service to go back to. The new service is never
/// deleted here, only scaled to zero.
pub(crate) async fn rollback<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &BlueGreenRollbackIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + ScalingOps + LoadBalancingOps,
{
    let data = &intent.rollback_data;
    let label = data
        .new_service_name
        .clone()
        .unwrap_or_else(|| data.base_name.clone());

    let outcome: Result<(), DeployError> = async {
        if !data.first_deployment {
            restore_blue_service(client, progress, cancel, &intent.cluster, data, &intent.poll)
                .await?;
        }

        if data.target_shift_started {
            progress.progress("shifting traffic back to the previous version");
            client
                .modify_listener_rule(
                    &data.prod.listener,
                    data.prod.rule.as_ref(),
                    &data.prod_target_group,
                )
                .await?;
            client
                .modify_listener_rule(
                    &data.stage.listener,
                    data.stage.rule.as_ref(),
                    &data.stage_target_group,
                )
                .await?;

            if let Some(new_name) = &data.new_service_name {
                client
                    .tag_service(&intent.cluster, new_name, VERSION_TAG_KEY, VERSION_GREEN)
                    .await?;
            }
            if let Some(old_name) = &data.blue_service_name {
                client
                    .tag_service(&intent.cluster, old_name, VERSION_TAG_KEY, VERSION_BLUE)
                    .await?;
            }
        }

        if let Some(new_name) = &data.new_service_name {
            scale_to_zero(client, progress, &intent.cluster, new_name).await?;
        }

        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => {
            progress.progress("rollback complete");
            Ok(DeploymentResult::succeeded(&label))
        }
        Err(DeployError::Timeout { waited }) => Ok(DeploymentResult::timed_out(
            &label,
            format!("rollback timed out after {}s", waited.as_secs()),
        )),
        Err(DeployError::Cancelled) => Err(DeployError::Cancelled),
        Err(err) => Err(DeployError::rollback_failed(format!(
            "blue/green rollback of {label}: {err}"
        ))),
    }
}

/// Finds the live versioned service: the slot that is active and tagged blue.
pub(crate) async fn find_blue_service<C>(
    client: &C,
    cluster: &str,
    base: &str,
) -> Result<Option<ServiceView>, DeployError>
where
    C: ServiceOps,
{
    for version in [1u8, 2] {
        let name = naming::versioned(base, version);
        if let Some(view) = client.describe_service(cluster, &name).await? {
            let tagged_blue =
                view.tags.get(VERSION_TAG_KEY).map(String::as_str) == Some(VERSION_BLUE);
            if view.status == ServiceStatus::Active && tagged_blue {
                return Ok(Some(view));
            }
        }
    }
    Ok(None)
}

/// Puts the old blue service back the way prepare found it. The desired
/// count is only ever raised, never lowered: capacity added since the
/// capture survives the rollback.
async fn restore_blue_service<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    cluster: &str,
    data: &BlueGreenRollbackData,
    poll: &PollSettings,
) -> Result<(), DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let Some(spec_yaml) = &data.blue_service else {
        return Err(DeployError::Snapshot(
            "rollback data is missing the captured blue service state".to_string(),
        ));
    };
    let spec: ServiceSpec = snapshot::parse("blue service state", spec_yaml)?;
    let name = spec.service_name.clone();

    progress.progress(&format!("restoring service {name}"));
    let live = client.describe_service(cluster, &name).await?;
    match live {
        Some(view) if view.status == ServiceStatus::Active => {
            if view.desired_count < spec.desired_count {
                progress.progress(&format!(
                    "raising desired count of {name} from {} back to {}",
                    view.desired_count, spec.desired_count
                ));
                client
                    .update_service(&ServiceUpdate {
                        cluster: cluster.to_string(),
                        service_name: name.clone(),
                        desired_count: Some(spec.desired_count),
                        task_definition: None,
                        force_new_deployment: false,
                    })
                    .await?;
            }
        }
        other => {
            if matches!(&other, Some(view) if view.status == ServiceStatus::Draining) {
                progress.detail(&format!("service {name} is draining, waiting for inactive"));
                waiter::await_service_inactive(client, cluster, &name, poll, progress, cancel)
                    .await?;
            }
            progress.progress(&format!(
                "recreating service {name} with desired count {}",
                spec.desired_count
            ));
            client.create_service(&spec).await?;
        }
    }
    waiter::await_service_steady(client, cluster, &name, poll, progress, cancel).await?;

    let targets = data
        .blue_scalable_targets
        .iter()
        .map(|yaml| snapshot::parse("scalable target", yaml))
        .collect::<Result<Vec<ScalableTargetSpec>, _>>()?;
    let policies = data
        .blue_scaling_policies
        .iter()
        .map(|yaml| snapshot::parse("scaling policy", yaml))
        .collect::<Result<Vec<ScalingPolicySpec>, _>>()?;
    service_flow::attach_scaling(client, cluster, &name, &targets, &policies).await?;
    Ok(())
}

/// Drives a service's desired count to zero. Absent or inactive services are
/// left alone; there is nothing to scale down.
async fn scale_to_zero<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cluster: &str,
    name: &str,
) -> Result<(), DeployError>
where
    C: ServiceOps,
{
    match client.describe_service(cluster, name).await? {
        Some(view) if view.status == ServiceStatus::Active => {
            progress.progress(&format!("scaling service {name} down to zero"));
            client
                .update_service(&ServiceUpdate {
                    cluster: cluster.to_string(),
                    service_name: name.to_string(),
                    desired_count: Some(0),
                    task_definition: None,
                    force_new_deployment: false,
                })
                .await?;
        }
        _ => {
            progress.detail(&format!("service {name} is not active, nothing to scale down"));
        }
    }
    Ok(())
}
