use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::remote::RemoteError, state::timer::InvalidTransition};

/// Errors surfaced by the sync services to their callers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected locally; nothing was sent to the backend.
    #[error("invalid input: {0}")]
    Validation(String),
    /// No response was received from the backend.
    #[error("backend unreachable")]
    Network(#[source] RemoteError),
    /// The backend answered with a failure.
    #[error("backend error")]
    Server(#[source] RemoteError),
    /// Operation cannot be performed in the current local state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested local entity was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Only transport failures are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    /// Short message suitable for inline display.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Validation(message) => message.clone(),
            SyncError::Network(_) => "connection problem, please try again".into(),
            SyncError::Server(source) => match source.status() {
                Some(status) => format!("server error: {status}"),
                None => "server error".into(),
            },
            SyncError::InvalidState(message) | SyncError::NotFound(message) => message.clone(),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        if err.is_network() {
            SyncError::Network(err)
        } else {
            SyncError::Server(err)
        }
    }
}

impl From<ValidationErrors> for SyncError {
    fn from(err: ValidationErrors) -> Self {
        SyncError::Validation(format!("validation failed: {}", err))
    }
}

impl From<InvalidTransition> for SyncError {
    fn from(err: InvalidTransition) -> Self {
        SyncError::InvalidState(err.to_string())
    }
}
