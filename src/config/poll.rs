// ABOUTME: Polling budget for steady state waits.
// ABOUTME: Timeout and interval with humantime-friendly YAML representation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long to wait for a service to settle, and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSettings {
    /// Total wall-clock budget for one wait.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Pause between probes.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15)
}
