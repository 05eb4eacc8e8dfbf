use std::error::Error;

use thiserror::Error;

/// Result alias for backend calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Transport-neutral failure of a backend call.
///
/// The split between [`RemoteError::Network`] and the other variants is what the
/// sync layer uses to decide between "stale data" and "server error" handling.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never reached the backend or no response came back.
    #[error("backend unreachable: {message}")]
    Network {
        /// Request that failed.
        message: String,
        /// Transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A response was received with a failure status.
    #[error("backend responded with status {status} for `{path}`")]
    Server {
        /// Endpoint that answered.
        path: String,
        /// Status code of the response.
        status: u16,
    },
    /// A response was received but its body could not be decoded.
    #[error("failed to decode backend response for `{path}`")]
    Decode {
        /// Endpoint that answered.
        path: String,
        /// Decoding failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend answered successfully but without the requested record.
    #[error("backend has no record for `{path}`")]
    NotFound {
        /// Endpoint that answered.
        path: String,
    },
}

impl RemoteError {
    /// Construct a network error from any transport failure.
    pub fn network(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        RemoteError::Network {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether no response was received at all.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Network { .. })
    }

    /// HTTP-like status carried by a server error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
