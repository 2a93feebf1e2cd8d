use std::{collections::HashMap, fmt, time::Duration};

use serde::Deserialize;
use serde_json::Value;

use crate::{transport::RawResponse, DispatchError};

/// Error kinds known to the API.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Base kind; has no status code of its own.
    Generic,
    InvalidRequest,
    NoAuthorization,
    PaymentRequired,
    Forbidden,
    NotFound,
    PreconditionFailed,
    RateLimitEnforced,
}

impl ErrorKind {
    /// Every known kind, in declaration order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Generic,
        ErrorKind::InvalidRequest,
        ErrorKind::NoAuthorization,
        ErrorKind::PaymentRequired,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::PreconditionFailed,
        ErrorKind::RateLimitEnforced,
    ];

    /// Status code this kind represents, if it declares one.
    pub fn status_code(self) -> Option<u16> {
        match self {
            ErrorKind::Generic => None,
            ErrorKind::InvalidRequest => Some(400),
            ErrorKind::NoAuthorization => Some(401),
            ErrorKind::PaymentRequired => Some(402),
            ErrorKind::Forbidden => Some(403),
            ErrorKind::NotFound => Some(404),
            ErrorKind::PreconditionFailed => Some(412),
            ErrorKind::RateLimitEnforced => Some(429),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ErrorKind::Generic => "Asana Error",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::NoAuthorization => "No Authorization",
            ErrorKind::PaymentRequired => "Payment Required",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::PreconditionFailed => "Precondition Failed",
            ErrorKind::RateLimitEnforced => "Rate Limit Enforced",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Maps response status codes to typed errors.
///
/// The table is built once from a fixed list of kinds; kinds without a
/// status code are skipped. Statuses missing from the table are treated as
/// success unless they fall in the 5xx range, which maps to
/// [`DispatchError::Unclassified`].
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
    table: HashMap<u16, ErrorKind>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(ErrorKind::ALL)
    }
}

impl ErrorClassifier {
    pub fn new(kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        let table = kinds
            .into_iter()
            .filter_map(|kind| kind.status_code().map(|status| (status, kind)))
            .collect();
        Self { table }
    }

    /// Looks up the registered kind for `status`.
    pub fn kind_for(&self, status: u16) -> Option<ErrorKind> {
        self.table.get(&status).copied()
    }

    /// Returns `None` when the response should be passed through as success.
    pub fn classify(&self, response: &RawResponse) -> Option<DispatchError> {
        let Some(kind) = self.kind_for(response.status) else {
            if (500..600).contains(&response.status) {
                return Some(DispatchError::Unclassified {
                    status: response.status,
                    body: response.body.clone(),
                });
            }
            return None;
        };

        let body = response.payload();
        let error = match kind {
            ErrorKind::RateLimitEnforced => DispatchError::RateLimited {
                retry_after: retry_after(response, &body),
                body,
            },
            ErrorKind::NoAuthorization => DispatchError::Unauthorized {
                message: error_message(kind, &body),
                body,
            },
            _ => DispatchError::Api {
                kind,
                status: response.status,
                message: error_message(kind, &body),
                body,
            },
        };
        Some(error)
    }
}

fn error_message(kind: ErrorKind, body: &Value) -> String {
    ErrorEnvelope::deserialize(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next())
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| kind.name().to_owned())
}

fn retry_after(response: &RawResponse, body: &Value) -> Duration {
    let from_header = response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<f64>().ok());
    let from_body = || {
        ["retry_after_seconds", "retry_after"]
            .into_iter()
            .find_map(|field| match body.get(field)? {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
    };

    from_header
        .or_else(from_body)
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .unwrap_or(Duration::ZERO)
}
