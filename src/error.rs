// ABOUTME: Application-wide error types for manifest loading.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest file not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
