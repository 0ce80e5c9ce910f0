// ABOUTME: Rolling deploy: register a task definition and update the service in place.
// ABOUTME: The service keeps its name; only the task definition and counts move.

use tokio_util::sync::CancellationToken;

use crate::cluster::{ScalingOps, ServiceOps};
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::fold_failure;
use super::planner::RollingIntent;
use super::result::DeploymentResult;
use super::service_flow::{self, ServicePlan};

pub(crate) async fn execute<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &RollingIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let name = intent.service_name.as_str();

    let outcome: Result<String, DeployError> = async {
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

        let plan = ServicePlan {
            spec: &spec,
            scalable_targets: &intent.scalable_targets,
            scaling_policies: &intent.scaling_policies,
            same_as_running: intent.same_as_running,
            force_new_deployment: intent.force_new_deployment,
            poll: &intent.poll,
        };
        service_flow::create_or_update_service(client, progress, cancel, &intent.cluster, &plan)
            .await?;

        progress.progress(&format!("service {name} reached steady state"));
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
