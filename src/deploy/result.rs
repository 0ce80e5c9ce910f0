// ABOUTME: Plain-data outcomes of deployments and rollbacks.
// ABOUTME: Constructed once by executors; no behavior beyond constructors.

use serde::{Deserialize, Serialize};

use super::request::BlueGreenRollbackData;

/// Terminal state of a deployment step.
///
/// `TimedOut` is not `Failed`: a timed-out service may still converge on its
/// own, and callers often roll back differently (or not at all) in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// What a strategy executor produced.
///
/// `error_message` is always present when the status is `Failed` or
/// `TimedOut` and never on success. Strategy-specific extras ride along:
/// `canary_deleted` for the canary delete step, `rollback_data` for the
/// blue/green steps, `tasks` for one-off task runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub status: DeployStatus,

    pub service_name: String,

    /// `family:revision` of the task definition this step registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Canary delete only: whether a canary service actually existed and was
    /// deleted. Deleting an absent canary succeeds with `false`.
    #[serde(default)]
    pub canary_deleted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_data: Option<BlueGreenRollbackData>,

    /// ARNs of launched one-off tasks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<String>,
}

impl DeploymentResult {
    pub fn succeeded(service_name: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::Succeeded,
            service_name: service_name.into(),
            task_definition: None,
            error_message: None,
            canary_deleted: false,
            rollback_data: None,
            tasks: Vec::new(),
        }
    }

    pub fn failed(service_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::Failed,
            service_name: service_name.into(),
            task_definition: None,
            error_message: Some(error_message.into()),
            canary_deleted: false,
            rollback_data: None,
            tasks: Vec::new(),
        }
    }

    pub fn timed_out(service_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::TimedOut,
            service_name: service_name.into(),
            task_definition: None,
            error_message: Some(error_message.into()),
            canary_deleted: false,
            rollback_data: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_task_definition(mut self, task_definition: impl Into<String>) -> Self {
        self.task_definition = Some(task_definition.into());
        self
    }

    pub fn with_canary_deleted(mut self, canary_deleted: bool) -> Self {
        self.canary_deleted = canary_deleted;
        self
    }

    pub fn with_rollback_data(mut self, rollback_data: BlueGreenRollbackData) -> Self {
        self.rollback_data = Some(rollback_data);
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == DeployStatus::Succeeded
    }
}

/// What a rollback produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub status: DeployStatus,

    pub service_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RollbackResult {
    pub fn succeeded(service_name: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::Succeeded,
            service_name: service_name.into(),
            error_message: None,
        }
    }

    pub fn timed_out(service_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            status: DeployStatus::TimedOut,
            service_name: service_name.into(),
            error_message: Some(error_message.into()),
        }
    }
}
