//! Error types shared by the HTTP backend implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::remote::RemoteError;

/// Convenient result alias returning [`HttpDaoError`] failures.
pub type HttpResult<T> = Result<T, HttpDaoError>;

/// Failures that can occur while talking to the study backend over HTTP.
#[derive(Debug, Error)]
pub enum HttpDaoError {
    /// Required environment variable is missing.
    #[error("missing backend environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build backend HTTP client")]
    ClientBuilder {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or no response was received.
    #[error("failed to send backend request to `{path}`")]
    RequestSend {
        /// Endpoint requested.
        path: String,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The backend returned a failure status code.
    #[error("unexpected backend response status {status} for `{path}`")]
    RequestStatus {
        /// Endpoint requested.
        path: String,
        /// Status received.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode backend response for `{path}`")]
    DecodeResponse {
        /// Endpoint requested.
        path: String,
        /// Body decoding failure.
        #[source]
        source: reqwest::Error,
    },
    /// Converting between a JSON value and the expected model failed.
    #[error("failed to convert backend value for `{path}`")]
    DeserializeValue {
        /// Endpoint requested.
        path: String,
        /// Conversion failure.
        #[source]
        source: serde_json::Error,
    },
    /// The backend encodes application errors as `{"error": ...}` with a 200 status.
    #[error("backend rejected `{path}`: {message}")]
    Rejected {
        /// Endpoint requested.
        path: String,
        /// Error text sent by the backend.
        message: String,
    },
    /// The backend answered `null` for a single-record lookup.
    #[error("backend returned no record for `{path}`")]
    MissingRecord {
        /// Endpoint requested.
        path: String,
    },
}

impl From<HttpDaoError> for RemoteError {
    fn from(err: HttpDaoError) -> Self {
        match err {
            HttpDaoError::RequestSend { path, source } => {
                RemoteError::network(format!("request to `{path}` failed"), source)
            }
            err @ (HttpDaoError::ClientBuilder { .. } | HttpDaoError::MissingEnvVar { .. }) => {
                RemoteError::network("backend client unavailable", err)
            }
            HttpDaoError::RequestStatus { path, status } => RemoteError::Server {
                path,
                status: status.as_u16(),
            },
            HttpDaoError::Rejected { path, .. } => RemoteError::Server {
                path,
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
            },
            HttpDaoError::DecodeResponse { path, source } => RemoteError::Decode {
                path,
                source: Box::new(source),
            },
            HttpDaoError::DeserializeValue { path, source } => RemoteError::Decode {
                path,
                source: Box::new(source),
            },
            HttpDaoError::MissingRecord { path } => RemoteError::NotFound { path },
        }
    }
}
