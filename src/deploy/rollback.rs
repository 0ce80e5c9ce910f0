// ABOUTME: Snapshot replay: put a service back the way its snapshot recorded it, or
// ABOUTME: delete what a first deployment created. Restore failures surface loudly.

use tokio_util::sync::CancellationToken;

use crate::cluster::{ScalingOps, ServiceOps};
use crate::config::PollSettings;
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::planner;
use super::result::RollbackResult;
use super::service_flow::{self, ServicePlan};
use super::snapshot::RollbackSnapshot;

/// Replays a snapshot. A first-deployment snapshot means nothing existed
/// before: restoring is deleting the service the deploy created, and an
/// already-absent service is a clean no-op. Anything that breaks during an
/// actual restore becomes `RollbackFailed`; there is no further compensating
/// layer behind this one.
pub(crate) async fn execute<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    snapshot: &RollbackSnapshot,
    poll: &PollSettings,
) -> Result<RollbackResult, DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let name = snapshot.service_name.as_str();

    let outcome: Result<(), DeployError> = async {
        if snapshot.first_deployment {
            progress.progress(&format!(
                "first deployment: deleting {name} to restore prior state"
            ));
            service_flow::delete_service_if_active(
                client,
                progress,
                cancel,
                &snapshot.cluster,
                name,
                poll,
            )
            .await?;
            return Ok(());
        }
        restore_snapshot(client, progress, cancel, snapshot, poll).await
    }
    .await;

    match outcome {
        Ok(()) => {
            progress.progress(&format!("service {name} restored"));
            Ok(RollbackResult::succeeded(name))
        }
        Err(DeployError::Timeout { waited }) => Ok(RollbackResult::timed_out(
            name,
            format!("rollback timed out after {}s", waited.as_secs()),
        )),
        Err(DeployError::Cancelled) => Err(DeployError::Cancelled),
        Err(err) => Err(DeployError::rollback_failed(format!(
            "restoring {name}: {err}"
        ))),
    }
}

/// Converges the snapshot's service back onto its captured state: spec,
/// scalable targets, and scaling policies, in that order. The restored
/// desired count is the max of the captured and live counts, so capacity
/// added after the capture is never thrown away.
pub(crate) async fn restore_snapshot<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    snapshot: &RollbackSnapshot,
    poll: &PollSettings,
) -> Result<(), DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let mut spec = snapshot.service_spec()?.ok_or_else(|| {
        DeployError::Snapshot("snapshot has no service state to restore".to_string())
    })?;
    let targets = snapshot.scalable_target_specs()?;
    let policies = snapshot.scaling_policy_specs()?;

    let live = client
        .describe_service(&snapshot.cluster, &spec.service_name)
        .await?;
    spec.desired_count = planner::restored_desired_count(
        spec.desired_count,
        live.as_ref().map(|view| view.desired_count),
    );

    progress.progress(&format!(
        "restoring service {} to its captured state (desired count {})",
        spec.service_name, spec.desired_count
    ));

    let plan = ServicePlan {
        spec: &spec,
        scalable_targets: &targets,
        scaling_policies: &policies,
        same_as_running: false,
        force_new_deployment: false,
        poll,
    };
    service_flow::create_or_update_service(client, progress, cancel, &snapshot.cluster, &plan)
        .await
}
