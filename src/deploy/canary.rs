// ABOUTME: Canary executor: stand up a small suffixed sibling of the service, and tear
// ABOUTME: it down again after verification. Deletion is idempotent on absent services.

use tokio_util::sync::CancellationToken;

use crate::cluster::ServiceOps;
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::fold_failure;
use super::planner::{CanaryDeleteIntent, CanaryDeployIntent};
use super::result::DeploymentResult;
use super::service_flow;
use super::waiter;

/// Deploys the canary service. A leftover canary from an earlier aborted run
/// is deleted first so the create below starts from a clean slate.
pub(crate) async fn deploy<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &CanaryDeployIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps,
{
    let name = intent.service_name.as_str();

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
            progress.warn(&format!("removed leftover canary service {name}"));
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

        progress.progress(&format!(
            "creating canary service {name} with {} task(s)",
            spec.desired_count
        ));
        client.create_service(&spec).await?;
        waiter::await_service_steady(client, &intent.cluster, name, &intent.poll, progress, cancel)
            .await?;

        progress.progress(&format!("canary service {name} reached steady state"));
        Ok(qualified)
    }
    .await;

    match outcome {
        Ok(task_definition) => {
            Ok(DeploymentResult::succeeded(name).with_task_definition(task_definition))
        }
        Err(err) => fold_failure(name, err),
    }
}

/// Deletes the canary service if it exists. Succeeds with `canary_deleted: false`
/// when there is nothing to delete, so repeated delete steps are harmless.
pub(crate) async fn delete<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &CanaryDeleteIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps,
{
    let name = intent.service_name.as_str();

    let outcome = service_flow::delete_service_if_active(
        client,
        progress,
        cancel,
        &intent.cluster,
        name,
        &intent.poll,
    )
    .await;

    match outcome {
        Ok(deleted) => {
            if deleted {
                progress.progress(&format!("canary service {name} deleted"));
            } else {
                progress.progress(&format!(
                    "canary service {name} does not exist, nothing to delete"
                ));
            }
            Ok(DeploymentResult::succeeded(name).with_canary_deleted(deleted))
        }
        Err(err) => fold_failure(name, err),
    }
}
