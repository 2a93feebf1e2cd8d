use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use crate::auth::{Authenticator, UnauthorizedHandler};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/";

/// What to do when an attempt is rejected with 401.
#[derive(Clone, Default)]
pub enum UnauthorizedHandling {
    /// Ask the configured authenticator to refresh credentials and replay
    /// the request if it reports success.
    #[default]
    Reauthorize,
    /// Surface 401 responses immediately.
    Disabled,
    /// Replay the request whenever the handler resolves to `true`.
    Custom(Arc<dyn UnauthorizedHandler>),
}

impl UnauthorizedHandling {
    pub fn custom(handler: impl UnauthorizedHandler + 'static) -> Self {
        Self::Custom(Arc::new(handler))
    }
}

impl fmt::Debug for UnauthorizedHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reauthorize => f.write_str("Reauthorize"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Dispatcher configuration. Every field defaults to "feature disabled".
#[derive(Clone)]
pub struct DispatcherOptions {
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Host prefix, including the trailing slash.
    pub base_url: String,
    /// Wait out 429 responses and replay, without a retry ceiling.
    pub retry_on_rate_limit: bool,
    pub default_headers: HashMap<String, String>,
    pub handle_unauthorized: UnauthorizedHandling,
    /// Bounds a single attempt, not the whole retry loop.
    pub request_timeout: Option<Duration>,
    pub default_proxy: Option<String>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            authenticator: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            retry_on_rate_limit: false,
            default_headers: HashMap::new(),
            handle_unauthorized: UnauthorizedHandling::default(),
            request_timeout: None,
            default_proxy: None,
        }
    }
}

impl fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field(
                "authenticator",
                &self.authenticator.as_ref().map(|_| "<configured>"),
            )
            .field("base_url", &self.base_url)
            .field("retry_on_rate_limit", &self.retry_on_rate_limit)
            .field("default_headers", &self.default_headers.keys())
            .field("handle_unauthorized", &self.handle_unauthorized)
            .field("request_timeout", &self.request_timeout)
            .field("default_proxy", &self.default_proxy)
            .finish()
    }
}

/// Per-call overrides; only headers are merged.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DispatchOptions {
    pub headers: HashMap<String, String>,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
