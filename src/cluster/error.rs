// ABOUTME: Control plane error types with SNAFU pattern.
// ABOUTME: Classifies failures into kinds so callers can branch without string matching.

use snafu::Snafu;

/// Unified error for control plane operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ClusterError {
    #[snafu(display("{entity} not found: {name}"))]
    NotFound { entity: &'static str, name: String },

    #[snafu(display("request throttled by control plane: {message}"))]
    Throttled { message: String },

    #[snafu(display("control plane temporarily unavailable: {message}"))]
    Unavailable { message: String },

    #[snafu(display("not authorized: {message}"))]
    Unauthorized { message: String },

    #[snafu(display("invalid request: {message}"))]
    InvalidRequest { message: String },

    #[snafu(display("control plane request failed: {message}"))]
    Api { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterErrorKind {
    /// The referenced resource does not exist.
    NotFound,
    /// Throttling or temporary outage; safe to retry within a poll budget.
    Transient,
    /// Credentials lack the required permission.
    Unauthorized,
    /// The request itself was malformed.
    Validation,
    /// Any other control plane failure.
    Other,
}

impl ClusterError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ClusterErrorKind {
        match self {
            ClusterError::NotFound { .. } => ClusterErrorKind::NotFound,
            ClusterError::Throttled { .. } | ClusterError::Unavailable { .. } => {
                ClusterErrorKind::Transient
            }
            ClusterError::Unauthorized { .. } => ClusterErrorKind::Unauthorized,
            ClusterError::InvalidRequest { .. } => ClusterErrorKind::Validation,
            ClusterError::Api { .. } => ClusterErrorKind::Other,
        }
    }

    /// Shorthand for a not-found error on a named resource.
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        ClusterError::NotFound {
            entity,
            name: name.into(),
        }
    }
}
