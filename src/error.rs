use std::time::Duration;

use serde_json::Value;

use crate::classify::ErrorKind;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Network or request execution error from `reqwest`. Never retried.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// HTTP 429 from the API.
    #[error("rate limit enforced, retry after {retry_after:?}")]
    RateLimited {
        /// Wait duration reported by the server.
        retry_after: Duration,
        /// Parsed response payload.
        body: Value,
    },
    /// HTTP 401 from the API.
    #[error("no authorization: {message}")]
    Unauthorized { message: String, body: Value },
    /// Any other status code with a registered error kind.
    #[error("{kind} ({status}): {message}")]
    Api {
        kind: ErrorKind,
        status: u16,
        message: String,
        body: Value,
    },
    /// Server failure status with no registered error kind, with raw response body.
    #[error("http error {status}: {body}")]
    Unclassified { status: u16, body: String },
    /// Invalid dispatcher setup, detected before any request is sent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Failure reported by an authenticator while establishing or refreshing credentials.
    #[error("authorization error: {0}")]
    Authorization(String),
}

impl DispatchError {
    /// HTTP status code that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimitEnforced.status_code(),
            Self::Unauthorized { .. } => ErrorKind::NoAuthorization.status_code(),
            Self::Api { status, .. } | Self::Unclassified { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::Configuration(_) | Self::Authorization(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}
