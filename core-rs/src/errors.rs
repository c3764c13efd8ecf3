//! Error types for devport

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevportError {
    #[error("Lock timeout: gave up on {resource} after {}ms", waited.as_millis())]
    LockTimeout { resource: String, waited: Duration },

    #[error("Port range exhausted: no free port in {start}-{end}")]
    PortRangeExhausted { start: u16, end: u16 },

    #[error("Port store corrupt: {0}")]
    StoreCorrupt(String),

    #[error("Runtime query failed: {0}")]
    RuntimeQueryFailed(String),

    #[error("Invalid port range: {0}")]
    InvalidRange(String),

    #[error("Invalid workspace: {0}")]
    InvalidWorkspace(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DevportError {
    /// Whether the caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DevportError::LockTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, DevportError>;
