// ABOUTME: Deployment manifest types and parsing for capstan.yml.
// ABOUTME: Handles YAML parsing, strategy selection, and polling defaults.

mod poll;

pub use poll::PollSettings;

use crate::cluster::{ScalableTargetSpec, ScalingPolicySpec, ServiceSpec, TaskDefinitionSpec};
use crate::error::{Error, Result};
use crate::types::{ListenerArn, ListenerRuleArn};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const MANIFEST_FILENAME: &str = "capstan.yml";
pub const MANIFEST_FILENAME_ALT: &str = "capstan.yaml";

/// Everything one deployment needs, as authored in a manifest file.
///
/// The credentials handle is deliberately absent: manifests are checked into
/// repositories, credentials are resolved by the surrounding system at
/// request time.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployManifest {
    pub region: String,

    pub cluster: String,

    pub service: ServiceSpec,

    pub task_definition: TaskDefinitionSpec,

    #[serde(default)]
    pub scalable_targets: Vec<ScalableTargetSpec>,

    #[serde(default)]
    pub scaling_policies: Vec<ScalingPolicySpec>,

    pub strategy: StrategyConfig,

    #[serde(default)]
    pub poll: PollSettings,
}

/// Which rollout strategy to run, with its knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Update the existing service in place.
    Rolling {
        /// Keep whatever count the service currently runs instead of the
        /// manifest's desired count.
        #[serde(default)]
        same_as_running: bool,

        #[serde(default)]
        force_new_deployment: bool,
    },

    /// Create a small sidecar service next to the stable one.
    Canary {
        suffix: String,

        #[serde(default = "default_canary_count")]
        count: i64,
    },

    /// Stage the new version behind a second target group and swap listeners.
    BlueGreen {
        prod_listener: ListenerArn,

        #[serde(default)]
        prod_listener_rule: Option<ListenerRuleArn>,

        stage_listener: ListenerArn,

        #[serde(default)]
        stage_listener_rule: Option<ListenerRuleArn>,

        /// Leave the old service scaled up after the swap.
        #[serde(default)]
        keep_old_service_scaled: bool,

        /// Grace period before downsizing the old service.
        #[serde(default, with = "humantime_serde")]
        downsize_delay: Option<Duration>,
    },

    /// Two fixed versioned names, no load balancer involvement.
    Basic,
}

fn default_canary_count() -> i64 {
    1
}

impl DeployManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Look for `capstan.yml` / `capstan.yaml` in a directory.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(MANIFEST_FILENAME), dir.join(MANIFEST_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ManifestNotFound(dir.join(MANIFEST_FILENAME)))
    }
}
