// ABOUTME: Deployment orchestration: plan requests into validated intents, then run
// ABOUTME: the strategy executors against a cluster client resolved per target.

mod basic;
mod blue_green;
mod canary;
mod error;
mod naming;
mod planner;
mod request;
mod result;
mod rollback;
mod rolling;
mod run_task;
mod service_flow;
mod snapshot;
mod waiter;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::{ClientFactory, LoadBalancingOps, ScalingOps, ServiceOps, TaskOps};
use crate::progress::ProgressSink;

pub use error::DeployError;
pub use naming::{
    VERSION_BLUE, VERSION_DELIMITER, VERSION_GREEN, VERSION_TAG_KEY, base_prefix,
    canary_service_name, stage_service_name, version_of, versioned,
};
pub use planner::{
    BasicCreateIntent, BasicRollbackIntent, BlueGreenCreateIntent, BlueGreenPrepareIntent,
    BlueGreenRollbackIntent, BlueGreenSwapIntent, CanaryDeleteIntent, CanaryDeployIntent,
    DeploymentIntent, RollingIntent, RunTaskIntent, plan,
};
pub use request::{
    BasicCreate, BasicRollback, BlueGreenCreateService, BlueGreenPrepareRollback,
    BlueGreenRollback, BlueGreenRollbackData, BlueGreenSwapTargetGroups, CanaryDelete,
    CanaryDeploy, ClusterTarget, DeployRequest, ListenerBinding, RollbackRequest, RollingDeploy,
    RunTask,
};
pub use result::{DeployStatus, DeploymentResult, RollbackResult};
pub use snapshot::RollbackSnapshot;
pub use waiter::{
    ProbeStatus, WaitError, await_service_inactive, await_service_steady, await_tasks_stopped,
    poll_until,
};

/// Entry point for running deployments.
///
/// Holds a client factory (clients are memoized per region and credentials)
/// and a progress sink shared by every invocation. Invocations are
/// independent: no state is carried between them, so one orchestrator can
/// serve concurrent deployments to different services or clusters.
pub struct Orchestrator<C> {
    clients: ClientFactory<C>,
    progress: Arc<dyn ProgressSink>,
}

impl<C> Orchestrator<C>
where
    C: ServiceOps + ScalingOps + LoadBalancingOps + TaskOps,
{
    pub fn new(clients: ClientFactory<C>, progress: Arc<dyn ProgressSink>) -> Self {
        Self { clients, progress }
    }

    /// Validate and run one deployment request.
    ///
    /// Strategy failures come back as a `DeploymentResult` carrying `Failed`
    /// or `TimedOut`; the `Err` channel is reserved for invalid requests,
    /// cancellation, and failed rollbacks.
    pub async fn execute(
        &self,
        request: &DeployRequest,
        cancel: &CancellationToken,
    ) -> Result<DeploymentResult, DeployError> {
        let intent = planner::plan(request)?;
        let client = self.clients.client(&request.target().client_key());
        let client = client.as_ref();
        let progress = self.progress.as_ref();

        match &intent {
            DeploymentIntent::Rolling(intent) => {
                rolling::execute(client, progress, cancel, intent).await
            }
            DeploymentIntent::CanaryDeploy(intent) => {
                canary::deploy(client, progress, cancel, intent).await
            }
            DeploymentIntent::CanaryDelete(intent) => {
                canary::delete(client, progress, cancel, intent).await
            }
            DeploymentIntent::BlueGreenPrepareRollback(intent) => {
                blue_green::prepare_rollback(client, progress, intent).await
            }
            DeploymentIntent::BlueGreenCreateService(intent) => {
                blue_green::create_service(client, progress, cancel, intent).await
            }
            DeploymentIntent::BlueGreenSwapTargetGroups(intent) => {
                blue_green::swap_target_groups(client, progress, cancel, intent).await
            }
            DeploymentIntent::BlueGreenRollback(intent) => {
                blue_green::rollback(client, progress, cancel, intent).await
            }
            DeploymentIntent::BasicCreate(intent) => {
                basic::create(client, progress, cancel, intent).await
            }
            DeploymentIntent::BasicRollback(intent) => {
                basic::roll_back(client, progress, cancel, intent).await
            }
            DeploymentIntent::RunTask(intent) => {
                run_task::execute(client, progress, cancel, intent).await
            }
        }
    }

    /// Capture a rollback snapshot of a service without mutating anything.
    /// Call this before `execute` so a later `rollback` has state to replay.
    pub async fn capture_snapshot(
        &self,
        target: &ClusterTarget,
        service_name: &str,
    ) -> Result<RollbackSnapshot, DeployError> {
        let client = self.clients.client(&target.client_key());
        RollbackSnapshot::capture(
            client.as_ref(),
            &target.cluster,
            service_name,
            self.progress.as_ref(),
        )
        .await
    }

    /// Replay a previously captured snapshot.
    pub async fn rollback(
        &self,
        request: &RollbackRequest,
        cancel: &CancellationToken,
    ) -> Result<RollbackResult, DeployError> {
        let client = self.clients.client(&request.target.client_key());
        rollback::execute(
            client.as_ref(),
            self.progress.as_ref(),
            cancel,
            &request.snapshot,
            &request.poll,
        )
        .await
    }
}

/// Shared failure handling for strategy executors: timeouts and cluster
/// failures fold into the result, while validation problems, cancellation,
/// and rollback failures stay loud.
pub(crate) fn fold_failure(
    service_name: &str,
    err: DeployError,
) -> Result<DeploymentResult, DeployError> {
    match err {
        DeployError::Timeout { waited } => Ok(DeploymentResult::timed_out(
            service_name,
            format!(
                "timed out after {}s waiting for the service",
                waited.as_secs()
            ),
        )),
        err @ (DeployError::Validation(_)
        | DeployError::Cancelled
        | DeployError::RollbackFailed(_)) => Err(err),
        err => Ok(DeploymentResult::failed(service_name, err.to_string())),
    }
}
