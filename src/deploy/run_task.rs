// ABOUTME: One-off task executor: register a task definition, launch N tasks, and
// ABOUTME: optionally wait for them to stop, failing on non-zero container exits.

use tokio_util::sync::CancellationToken;

use crate::cluster::{RunTaskSpec, ServiceOps, TaskOps};
use crate::progress::ProgressSink;
use crate::types::TaskArn;

use super::error::DeployError;
use super::fold_failure;
use super::planner::RunTaskIntent;
use super::result::DeploymentResult;
use super::waiter;

pub(crate) async fn execute<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    intent: &RunTaskIntent,
) -> Result<DeploymentResult, DeployError>
where
    C: ServiceOps + TaskOps,
{
    let family = intent.task_definition.family.as_str();

    let outcome: Result<DeploymentResult, DeployError> = async {
        progress.progress(&format!("registering task definition {family}"));
        let registered = client
            .register_task_definition(&intent.task_definition)
            .await?;
        let qualified = registered.qualified_name();

        progress.progress(&format!(
            "launching {} task(s) from {qualified}",
            intent.count
        ));
        let launched = client
            .run_task(&RunTaskSpec {
                cluster: intent.cluster.clone(),
                task_definition: qualified.clone(),
                count: intent.count,
                group: intent.group.clone(),
                launch_type: intent.launch_type.clone(),
            })
            .await?;
        let arns: Vec<TaskArn> = launched.iter().map(|task| task.arn.clone()).collect();
        let arn_strings: Vec<String> = arns.iter().map(|arn| arn.to_string()).collect();

        if intent.skip_wait {
            progress.progress("not waiting for tasks to finish");
            return Ok(DeploymentResult::succeeded(family)
                .with_task_definition(qualified)
                .with_tasks(arn_strings));
        }

        waiter::await_tasks_stopped(client, &intent.cluster, &arns, &intent.poll, progress, cancel)
            .await?;

        let stopped = client.describe_tasks(&intent.cluster, &arns).await?;
        let mut failures = Vec::new();
        for task in &stopped {
            for container in task.failed_containers() {
                let exit = container
                    .exit_code
                    .map_or("none".to_string(), |code| code.to_string());
                let reason = task.stopped_reason.as_deref().unwrap_or("no reason given");
                failures.push(format!(
                    "container {} of {} exited {exit} ({reason})",
                    container.name, task.arn
                ));
            }
        }
        if !failures.is_empty() {
            return Ok(DeploymentResult::failed(family, failures.join("; "))
                .with_task_definition(qualified)
                .with_tasks(arn_strings));
        }

        progress.progress(&format!("all {} task(s) finished cleanly", stopped.len()));
        Ok(DeploymentResult::succeeded(family)
            .with_task_definition(qualified)
            .with_tasks(arn_strings))
    }
    .await;

    match outcome {
        Ok(result) => Ok(result),
        Err(err) => fold_failure(family, err),
    }
}
