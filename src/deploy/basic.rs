// ABOUTME: Basic two-name deploy: versioned slots base__1/base__2 without a load
// ABOUTME: balancer. New goes up under the free name, old is parked at zero.

use tokio_util::sync::CancellationToken;

use crate::cluster::{ScalingOps, ServiceOps, ServiceStatus, ServiceUpdate, ServiceView};
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::fold_failure;
use super::planner::{BasicCreateIntent, BasicRollbackIntent};
use super::result::DeploymentResult;
use super::rollback;
use super::service_flow;
use super::waiter;

pub(crate) async fn create<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &BasicCreateIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps,
{
    let base = intent.base_name.as_str();

    let one = match client.describe_service(&intent.cluster, &intent.version_one).await {
        Ok(view) => view,
        Err(err) => return fold_failure(base, DeployError::Cluster(err)),
    };
    let two = match client.describe_service(&intent.cluster, &intent.version_two).await {
        Ok(view) => view,
        Err(err) => return fold_failure(base, DeployError::Cluster(err)),
    };

    let (old_name, new_name) = match (is_active(&one), is_active(&two)) {
        (true, true) => {
            return Ok(DeploymentResult::failed(
                base,
                format!(
                    "both version slots {} and {} are active; resolve manually before deploying",
                    intent.version_one, intent.version_two
                ),
            ));
        }
        (true, false) => (Some(intent.version_one.clone()), intent.version_two.clone()),
        (false, true) => (Some(intent.version_two.clone()), intent.version_one.clone()),
        (false, false) => (None, intent.version_one.clone()),
    };

    let outcome: Result<String, DeployError> = async {
        let leftover = if new_name == intent.version_one { &one } else { &two };
        if matches!(leftover, Some(view) if view.status == ServiceStatus::Draining) {
            progress.detail(&format!("service {new_name} is draining, waiting for inactive"));
            waiter::await_service_inactive(
                client,
                &intent.cluster,
                &new_name,
                &intent.poll,
                progress,
                cancel,
            )
            .await?;
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
        spec.service_name = new_name.clone();
        spec.task_definition = Some(qualified.clone());

        progress.progress(&format!("creating service {new_name}"));
        client.create_service(&spec).await?;
        waiter::await_service_steady(
            client,
            &intent.cluster,
            &new_name,
            &intent.poll,
            progress,
            cancel,
        )
        .await?;

        if let Some(old) = &old_name {
            progress.progress(&format!("downsizing previous service {old} to zero"));
            client
                .update_service(&ServiceUpdate {
                    cluster: intent.cluster.clone(),
                    service_name: old.clone(),
                    desired_count: Some(0),
                    task_definition: None,
                    force_new_deployment: false,
                })
                .await?;
            waiter::await_service_steady(
                client,
                &intent.cluster,
                old,
                &intent.poll,
                progress,
                cancel,
            )
            .await?;
        }

        progress.progress(&format!("service {new_name} is live"));
        Ok(qualified)
    }
    .await;

    match outcome {
        Ok(task_definition) => {
            Ok(DeploymentResult::succeeded(&new_name).with_task_definition(task_definition))
        }
        Err(err) => fold_failure(&new_name, err),
    }
}

/// Undo a basic deploy: drop the new service, then put the old one back from
/// the snapshot the caller captured before deploying.
pub(crate) async fn roll_back<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &BasicRollbackIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let new_name = intent.new_service_name.as_str();

    let outcome: Result<(), DeployError> = async {
        progress.progress(&format!("removing service {new_name}"));
        service_flow::delete_service_if_active(
            client,
            progress,
            cancel,
            &intent.cluster,
            new_name,
            &intent.poll,
        )
        .await?;

        if intent.snapshot.first_deployment {
            progress.progress("first deployment, nothing to restore");
            return Ok(());
        }
        rollback::restore_snapshot(client, progress, cancel, &intent.snapshot, &intent.poll).await
    }
    .await;

    match outcome {
        Ok(()) => {
            progress.progress("rollback complete");
            Ok(DeploymentResult::succeeded(new_name))
        }
        Err(DeployError::Timeout { waited }) => Ok(DeploymentResult::timed_out(
            new_name,
            format!("rollback timed out after {}s", waited.as_secs()),
        )),
        Err(DeployError::Cancelled) => Err(DeployError::Cancelled),
        Err(err) => Err(DeployError::rollback_failed(format!(
            "rollback of {new_name}: {err}"
        ))),
    }
}

fn is_active(view: &Option<ServiceView>) -> bool {
    matches!(view, Some(v) if v.status == ServiceStatus::Active)
}
