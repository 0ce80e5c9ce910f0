// ABOUTME: Progress reporting for long-running deployment operations.
// ABOUTME: Executors narrate through a sink; callers decide where it goes.

use tracing::{debug, info, warn};

/// Where executors send human-readable progress.
///
/// `progress` marks phase boundaries ("creating service x"), `detail` carries
/// per-poll observations (task counts, service events), `warn` flags
/// conditions that don't stop the deployment (a throttled poll, a leftover
/// canary being cleared).
pub trait ProgressSink: Send + Sync {
    fn progress(&self, message: &str);
    fn detail(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Routes progress into the `tracing` subscriber under the `capstan` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&self, message: &str) {
        info!(target: "capstan", "{message}");
    }

    fn detail(&self, message: &str) {
        debug!(target: "capstan", "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(target: "capstan", "{message}");
    }
}

/// Discards all progress. For callers that only care about the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _message: &str) {}
    fn detail(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
