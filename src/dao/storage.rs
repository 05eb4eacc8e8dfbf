use std::error::Error;

use thiserror::Error;

/// Result alias for local persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by local persistence backends regardless of the medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The medium could not be read or written.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Operation that failed.
        message: String,
        /// Underlying I/O failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be decoded.
    #[error("corrupted record under `{key}`")]
    Corrupted {
        /// Key of the unreadable record.
        key: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
