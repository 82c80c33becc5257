//! Client error model.

use thiserror::Error;

/// Failure of one API call, as seen by the caller of the [`crate::Gateway`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Transport failure (connect, timeout, reset). Never retried.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success status other than the handled 401.
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// 401 that could not be recovered (no session, or the replay was
    /// rejected too).
    #[error("unauthorized")]
    Unauthorized,

    /// Token refresh was rejected; the local session has been cleared.
    #[error("session terminated; please log in again")]
    SessionTerminated,

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Request could not be built (e.g. body serialization).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A spawned request task died before producing a result.
    #[error("request task aborted: {0}")]
    Aborted(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized | ApiError::SessionTerminated => Some(401),
            _ => None,
        }
    }

    /// The caller must send the user back to the login entry point.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::SessionTerminated)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid timeout '{0}': expected whole seconds")]
    InvalidTimeout(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
