use std::time::Duration;

use serde_json::Value;

use crate::{classify::ErrorClassifier, transport::RawResponse, DispatchError, Result};

/// Added to every server-provided rate-limit wait to absorb rounding at the
/// window boundary.
pub const RATE_LIMIT_MARGIN: Duration = Duration::from_millis(500);

pub(crate) fn rate_limit_delay(retry_after: Duration) -> Duration {
    retry_after.saturating_add(RATE_LIMIT_MARGIN)
}

/// States of a single call's attempt loop.
///
/// `Succeeded` and `Failed` are terminal. `ReauthPending` carries the 401
/// error so it can be surfaced unchanged if reauthorization does not pan out.
#[derive(Debug)]
pub(crate) enum AttemptState {
    Attempting,
    RateLimitWait(Duration),
    ReauthPending(DispatchError),
    Succeeded(Value),
    Failed(DispatchError),
}

/// Which recoverable conditions a dispatcher absorbs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct RetryPolicy {
    pub(crate) retry_on_rate_limit: bool,
    pub(crate) handle_unauthorized: bool,
}

impl AttemptState {
    /// Transition out of `Attempting` once a response has arrived.
    pub(crate) fn after_response(
        response: &RawResponse,
        classifier: &ErrorClassifier,
        policy: RetryPolicy,
    ) -> Self {
        let Some(error) = classifier.classify(response) else {
            return Self::Succeeded(response.payload());
        };

        match error {
            DispatchError::RateLimited { retry_after, .. } if policy.retry_on_rate_limit => {
                Self::RateLimitWait(rate_limit_delay(retry_after))
            }
            error @ DispatchError::Unauthorized { .. } if policy.handle_unauthorized => {
                Self::ReauthPending(error)
            }
            error => Self::Failed(error),
        }
    }

    /// Transition out of `ReauthPending`.
    ///
    /// A failing handler is reported as the original 401, not as its own error.
    pub(crate) fn after_reauthorization(signal: Result<bool>, original: DispatchError) -> Self {
        match signal {
            Ok(true) => Self::Attempting,
            Ok(false) => Self::Failed(original),
            Err(cause) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %cause, "unauthorized handler failed");

                #[cfg(not(feature = "tracing"))]
                let _ = cause;

                Self::Failed(original)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use serde_json::{json, Value};

    use super::{rate_limit_delay, AttemptState, RetryPolicy};
    use crate::{classify::ErrorClassifier, transport::RawResponse, DispatchError};

    const ALL_RETRIES: RetryPolicy = RetryPolicy {
        retry_on_rate_limit: true,
        handle_unauthorized: true,
    };

    fn response(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    fn unauthorized() -> DispatchError {
        DispatchError::Unauthorized {
            message: "Not Authorized".to_owned(),
            body: Value::Null,
        }
    }

    #[test]
    fn success_carries_parsed_payload() {
        let state = AttemptState::after_response(
            &response(200, json!({"data": {"id": 1}})),
            &ErrorClassifier::default(),
            RetryPolicy::default(),
        );
        match state {
            AttemptState::Succeeded(payload) => assert_eq!(payload, json!({"data": {"id": 1}})),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_wait_adds_margin() {
        let state = AttemptState::after_response(
            &response(429, json!({"retry_after_seconds": 2})),
            &ErrorClassifier::default(),
            ALL_RETRIES,
        );
        match state {
            AttemptState::RateLimitWait(delay) => assert_eq!(delay, Duration::from_millis(2500)),
            other => panic!("expected rate limit wait, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_delay_saturates_near_max() {
        assert_eq!(rate_limit_delay(Duration::MAX), Duration::MAX);
        assert_eq!(
            rate_limit_delay(Duration::from_secs(1)),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn rate_limit_without_retry_policy_fails() {
        let state = AttemptState::after_response(
            &response(429, json!({"retry_after_seconds": 2})),
            &ErrorClassifier::default(),
            RetryPolicy::default(),
        );
        assert!(matches!(
            state,
            AttemptState::Failed(DispatchError::RateLimited { .. })
        ));
    }

    #[test]
    fn unauthorized_goes_to_reauth_only_with_handler() {
        let classifier = ErrorClassifier::default();
        let with_handler =
            AttemptState::after_response(&response(401, json!({})), &classifier, ALL_RETRIES);
        assert!(matches!(with_handler, AttemptState::ReauthPending(_)));

        let without_handler = AttemptState::after_response(
            &response(401, json!({})),
            &classifier,
            RetryPolicy::default(),
        );
        assert!(matches!(
            without_handler,
            AttemptState::Failed(DispatchError::Unauthorized { .. })
        ));
    }

    #[test]
    fn other_classified_errors_are_terminal() {
        let state =
            AttemptState::after_response(&response(404, json!({})), &ErrorClassifier::default(), ALL_RETRIES);
        assert!(matches!(state, AttemptState::Failed(DispatchError::Api { .. })));
    }

    #[test]
    fn reauthorization_signal_drives_transition() {
        assert!(matches!(
            AttemptState::after_reauthorization(Ok(true), unauthorized()),
            AttemptState::Attempting
        ));
        assert!(matches!(
            AttemptState::after_reauthorization(Ok(false), unauthorized()),
            AttemptState::Failed(DispatchError::Unauthorized { .. })
        ));
    }

    #[test]
    fn handler_failure_is_replaced_by_original_error() {
        let state = AttemptState::after_reauthorization(
            Err(DispatchError::Authorization("refresh endpoint down".to_owned())),
            unauthorized(),
        );
        assert!(matches!(
            state,
            AttemptState::Failed(DispatchError::Unauthorized { .. })
        ));
    }
}
