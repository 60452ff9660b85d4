//! Errors returned across the appliance boundary.

use thiserror::Error;

/// Outcome classes of a single remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The appliance has never been provisioned (redirect to the first-run page).
    #[error("setup required")]
    SetupRequired,

    /// Network, TLS or per-call timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success response from a reachable appliance.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A success response whose body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Transport-class errors say nothing about the appliance's state.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;
