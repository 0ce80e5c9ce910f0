// ABOUTME: Steady state waiting: poll a probe until it settles, times out, or is cancelled.
// ABOUTME: Transient control plane errors are retried inside the budget; everything else aborts.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cluster::{
    ClusterError, ClusterErrorKind, ServiceOps, ServiceStatus, TaskOps,
};
use crate::config::PollSettings;
use crate::progress::ProgressSink;
use crate::types::TaskArn;

/// One probe observation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    /// The awaited condition holds.
    Settled,
    /// Not yet; the detail line is surfaced to the progress sink.
    Pending { detail: String },
}

/// Why a wait ended without settling.
///
/// Timeout and cancellation are deliberately distinct from each other and
/// from failure: a timed-out deployment may still converge on its own, a
/// cancelled one was the caller's decision, and an aborted one hit an error
/// that retrying would not fix.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timed out after {}s", waited.as_secs())]
    Timeout { waited: Duration },

    #[error("wait cancelled")]
    Cancelled,

    #[error("wait aborted: {source}")]
    Aborted { source: ClusterError },
}

/// Evaluate `probe` now and then every `poll_interval` until it settles.
///
/// The timeout bounds total wall time from entry, not per-probe time. Probe
/// errors classified as transient (throttling, momentary outage) are logged
/// and retried on the next tick while budget remains; any other error aborts
/// the wait immediately. The probe is never evaluated concurrently with
/// itself.
pub async fn poll_until<F, Fut>(
    mut probe: F,
    settings: &PollSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ProbeStatus, ClusterError>>,
{
    let start = tokio::time::Instant::now();

    loop {
        let observed = tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            observed = probe() => observed,
        };

        match observed {
            Ok(ProbeStatus::Settled) => return Ok(()),
            Ok(ProbeStatus::Pending { detail }) => progress.detail(&detail),
            Err(e) if e.kind() == ClusterErrorKind::Transient => {
                progress.warn(&format!("poll failed, will retry: {e}"));
            }
            Err(source) => return Err(WaitError::Aborted { source }),
        }

        if start.elapsed() >= settings.timeout {
            return Err(WaitError::Timeout {
                waited: start.elapsed(),
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }
}

/// Wait until a service is steady: active, exactly one rollout generation in
/// flight, and as many tasks running as desired.
///
/// The service disappearing mid-wait aborts the wait. New service events are
/// surfaced to the progress sink exactly once each.
pub async fn await_service_steady<C: ServiceOps>(
    client: &C,
    cluster: &str,
    service: &str,
    settings: &PollSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), WaitError> {
    let seen_events: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let seen = &seen_events;

    poll_until(
        || async move {
            let view = client
                .describe_service(cluster, service)
                .await?
                .ok_or_else(|| ClusterError::not_found("service", service.to_string()))?;

            for event in &view.events {
                if seen.lock().insert(event.id.clone()) {
                    progress.detail(&format!("{service}: {}", event.message));
                }
            }

            if view.status == ServiceStatus::Active
                && view.deployment_count == 1
                && view.running_count == view.desired_count
            {
                Ok(ProbeStatus::Settled)
            } else {
                Ok(ProbeStatus::Pending {
                    detail: format!(
                        "{service}: {}/{} tasks running, {} rollout(s) in flight",
                        view.running_count, view.desired_count, view.deployment_count
                    ),
                })
            }
        },
        settings,
        progress,
        cancel,
    )
    .await
}

/// Wait until a service is gone or inactive. Used before re-creating a name
/// whose previous incarnation is still draining.
pub async fn await_service_inactive<C: ServiceOps>(
    client: &C,
    cluster: &str,
    service: &str,
    settings: &PollSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), WaitError> {
    poll_until(
        || async move {
            match client.describe_service(cluster, service).await? {
                None => Ok(ProbeStatus::Settled),
                Some(view) if view.status == ServiceStatus::Inactive => Ok(ProbeStatus::Settled),
                Some(view) => Ok(ProbeStatus::Pending {
                    detail: format!("{service} is {:?}, waiting for inactive", view.status),
                }),
            }
        },
        settings,
        progress,
        cancel,
    )
    .await
}

/// Wait until every listed one-off task has stopped. Exit codes are the
/// caller's business; this only waits for the tasks to finish.
pub async fn await_tasks_stopped<C: TaskOps>(
    client: &C,
    cluster: &str,
    task_arns: &[TaskArn],
    settings: &PollSettings,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), WaitError> {
    poll_until(
        || async move {
            let tasks = client.describe_tasks(cluster, task_arns).await?;
            let stopped = tasks.iter().filter(|t| t.is_stopped()).count();
            if stopped == task_arns.len() {
                Ok(ProbeStatus::Settled)
            } else {
                Ok(ProbeStatus::Pending {
                    detail: format!("{stopped}/{} tasks stopped", task_arns.len()),
                })
            }
        },
        settings,
        progress,
        cancel,
    )
    .await
}
