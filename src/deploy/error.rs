// ABOUTME: Error types for deployment operations.
// ABOUTME: Separates caller mistakes, cluster failures, timeouts, and failed restores.

use std::time::Duration;

use crate::cluster::ClusterError;

/// Errors that can surface from planning and executing deployments.
///
/// Executors fold most runtime failures into their result's status and
/// `error_message` instead of returning them; what does come back as an error
/// is either the caller's fault (`Validation`), the caller's decision
/// (`Cancelled`), or the one situation that must never pass silently: a
/// rollback that could not restore the previous state.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The request is structurally invalid.
    #[error("invalid deployment request: {0}")]
    Validation(String),

    /// A control plane call failed.
    #[error("cluster operation failed: {0}")]
    Cluster(#[from] ClusterError),

    /// A steady state wait exhausted its budget.
    #[error("timed out after {}s waiting for steady state", waited.as_secs())]
    Timeout { waited: Duration },

    /// The caller cancelled the operation.
    #[error("deployment cancelled")]
    Cancelled,

    /// A rollback snapshot could not be captured or parsed.
    #[error("rollback snapshot error: {0}")]
    Snapshot(String),

    /// A rollback could not restore the previous state. The cluster is in an
    /// unknown state and needs operator attention.
    #[error("rollback failed: {0}")]
    RollbackFailed(String),
}

impl DeployError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeployError::Validation(message.into())
    }

    pub fn rollback_failed(message: impl Into<String>) -> Self {
        DeployError::RollbackFailed(message.into())
    }
}

impl From<super::waiter::WaitError> for DeployError {
    fn from(err: super::waiter::WaitError) -> Self {
        use super::waiter::WaitError;
        match err {
            WaitError::Timeout { waited } => DeployError::Timeout { waited },
            WaitError::Cancelled => DeployError::Cancelled,
            WaitError::Aborted { source } => DeployError::Cluster(source),
        }
    }
}
