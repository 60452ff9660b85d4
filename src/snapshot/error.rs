//! Instance-level fatal errors.

use thiserror::Error;

use crate::config::validation::{join_errors, ValidationError};
use crate::remote::RemoteError;

/// Stops all processing of one instance for the current run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("invalid instance configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("snapshot fetch failed: {0}")]
    Fetch(RemoteError),

    #[error("initial setup failed: {0}")]
    SetupFailed(RemoteError),

    #[error("appliance still requires setup after provisioning")]
    SetupStillRequired,

    #[error("run deadline exceeded")]
    DeadlineExceeded,
}

impl SyncError {
    /// Short machine-readable class, used as a metrics label.
    pub fn class(&self) -> &'static str {
        match self {
            SyncError::Validation(_) => "validation",
            SyncError::Fetch(e) if e.is_transport() => "transport",
            SyncError::Fetch(_) => "api",
            SyncError::SetupFailed(_) | SyncError::SetupStillRequired => "setup",
            SyncError::DeadlineExceeded => "deadline",
        }
    }
}
