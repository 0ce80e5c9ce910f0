// ABOUTME: Validated service name for managed cluster services.
// ABOUTME: Enforces the control plane's character set and length limits.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of 255 characters")]
    TooLong,

    #[error("service name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in service name: '{0}'")]
    InvalidChar(char),
}

/// A service name accepted by the control plane: up to 255 letters, digits,
/// hyphens, and underscores, starting with a letter or digit.
///
/// Underscores matter here: versioned blue/green names use a `__` delimiter,
/// so the character set is wider than a DNS label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        if value.is_empty() {
            return Err(ServiceNameError::Empty);
        }

        if value.len() > 255 {
            return Err(ServiceNameError::TooLong);
        }

        let first = value.chars().next().unwrap_or_default();
        if !first.is_ascii_alphanumeric() {
            return Err(ServiceNameError::InvalidStart);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
                return Err(ServiceNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
