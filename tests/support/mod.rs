// ABOUTME: Test support utilities.
// ABOUTME: Provides a scriptable in-memory cluster and a recording progress sink.

use std::sync::{Arc, Once};

// Each test binary only uses some of these helpers, so allow dead_code.
#[allow(dead_code)]
pub mod fake_cluster;

use parking_lot::Mutex;

use capstan::cluster::{ClientFactory, CredentialsHandle};
use capstan::config::PollSettings;
use capstan::deploy::{ClusterTarget, Orchestrator};
use capstan::progress::ProgressSink;

use fake_cluster::FakeCluster;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("capstan=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// The cluster target every test deploys into.
#[allow(dead_code)]
pub fn target() -> ClusterTarget {
    ClusterTarget::new("prod", "eu-west-1", CredentialsHandle::new("test-account"))
}

/// A short polling budget so timeout paths finish quickly under the paused
/// test clock.
#[allow(dead_code)]
pub fn fast_poll() -> PollSettings {
    PollSettings {
        timeout: std::time::Duration::from_secs(1),
        poll_interval: std::time::Duration::from_millis(100),
    }
}

/// An orchestrator wired to the given fake cluster and sink.
#[allow(dead_code)]
pub fn orchestrator(
    cluster: &Arc<FakeCluster>,
    sink: &Arc<RecordingSink>,
) -> Orchestrator<FakeCluster> {
    init_tracing();
    let progress: Arc<dyn ProgressSink> = Arc::<RecordingSink>::clone(sink);
    Orchestrator::new(ClientFactory::fixed(Arc::clone(cluster)), progress)
}

/// Index of the first recorded call starting with `needle`. Panics with the
/// full call log when there is none, so a failing order assertion shows what
/// actually happened.
#[allow(dead_code)]
pub fn call_index(calls: &[String], needle: &str) -> usize {
    calls
        .iter()
        .position(|line| line.starts_with(needle))
        .unwrap_or_else(|| panic!("no call starting with {needle:?} in {calls:#?}"))
}

/// Progress sink that records everything it is told, for assertions on the
/// narration a deployment produced.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl ProgressSink for RecordingSink {
    fn progress(&self, message: &str) {
        self.lines.lock().push(format!("progress: {message}"));
    }

    fn detail(&self, message: &str) {
        self.lines.lock().push(format!("detail: {message}"));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().push(format!("warn: {message}"));
    }
}
