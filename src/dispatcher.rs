use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, OnceLock},
    time::Duration,
};

use serde_json::{json, Value};

// tokio::time::sleep is only available on non-WASM targets.
#[cfg(not(target_arch = "wasm32"))]
use tokio::time::sleep;
#[cfg(target_arch = "wasm32")]
use wasmtimer::tokio::sleep;

use crate::{
    attempt::{AttemptState, RetryPolicy},
    auth::{Authenticator, BearerAuthenticator},
    classify::ErrorClassifier,
    request::{Body, Method, RequestSpec},
    transport::{ReqwestTransport, Transport},
    version::{platform_diagnostics, DiagnosticsProvider, VersionInfo, CLIENT_LIB_HEADER},
    DispatchError, DispatchOptions, DispatcherOptions, Result, UnauthorizedHandling,
};

/// Path segment between the base URL and every resource path.
pub const API_PATH: &str = "api/1.0";

/// Authenticated dispatcher for the Asana REST API.
///
/// Every call runs its own attempt loop: rate-limited attempts are replayed
/// after the server-provided wait when `retry_on_rate_limit` is set, and
/// unauthorized attempts are replayed when the unauthorized handler says so.
/// Attempts within one call are strictly sequential.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    authenticator: Option<Arc<dyn Authenticator>>,
    base_url: String,
    default_headers: HashMap<String, String>,
    retry_on_rate_limit: bool,
    handle_unauthorized: UnauthorizedHandling,
    request_timeout: Option<Duration>,
    default_proxy: Option<String>,
    classifier: Arc<ErrorClassifier>,
    diagnostics: Arc<dyn DiagnosticsProvider>,
    version_info: Arc<OnceLock<VersionInfo>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .field(
                "authenticator",
                &self.authenticator.as_ref().map(|_| "<redacted>"),
            )
            .field("retry_on_rate_limit", &self.retry_on_rate_limit)
            .field("handle_unauthorized", &self.handle_unauthorized)
            .field("request_timeout", &self.request_timeout)
            .field("default_proxy", &self.default_proxy)
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherOptions::default())
    }
}

impl Dispatcher {
    /// Creates a dispatcher that sends requests with `reqwest`.
    pub fn new(options: DispatcherOptions) -> Self {
        Self::with_transport(options, ReqwestTransport::new())
    }

    /// Creates a dispatcher on top of a custom transport.
    pub fn with_transport(options: DispatcherOptions, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            authenticator: options.authenticator,
            base_url: options.base_url,
            default_headers: options.default_headers,
            retry_on_rate_limit: options.retry_on_rate_limit,
            handle_unauthorized: options.handle_unauthorized,
            request_timeout: options.request_timeout,
            default_proxy: options.default_proxy,
            classifier: Arc::new(ErrorClassifier::default()),
            diagnostics: Arc::new(platform_diagnostics()),
            version_info: Arc::default(),
        }
    }

    /// Creates a dispatcher from environment variables.
    ///
    /// Reads:
    /// - `ASANA_ACCESS_TOKEN`: personal access token (Bearer prefix optional)
    /// - `ASANA_BASE_URL`: optional, overrides [`DEFAULT_BASE_URL`](crate::DEFAULT_BASE_URL)
    ///
    /// **Not available on `wasm32` targets**; environment variables do not
    /// exist in browser runtimes.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use asana_dispatch::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::from_env().expect("missing ASANA_ACCESS_TOKEN");
    /// ```
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var("ASANA_ACCESS_TOKEN").ok(),
            std::env::var("ASANA_BASE_URL").ok(),
        )
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn from_vars(token: Option<String>, base_url: Option<String>) -> Result<Self> {
        let token = token.ok_or_else(|| {
            DispatchError::Configuration("missing ASANA_ACCESS_TOKEN environment variable".to_owned())
        })?;
        if token.trim().is_empty() {
            return Err(DispatchError::Configuration(
                "ASANA_ACCESS_TOKEN is set but empty".to_owned(),
            ));
        }

        let mut options = DispatcherOptions {
            authenticator: Some(Arc::new(BearerAuthenticator::new(token))),
            ..DispatcherOptions::default()
        };
        if let Some(base_url) = base_url {
            if base_url.trim().is_empty() {
                return Err(DispatchError::Configuration(
                    "ASANA_BASE_URL is set but empty".to_owned(),
                ));
            }
            options.base_url = base_url;
        }
        Ok(Self::new(options))
    }

    /// Replaces the error classification table.
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Replaces the source of the diagnostic header.
    pub fn with_diagnostics(mut self, diagnostics: impl DiagnosticsProvider + 'static) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self.version_info = Arc::default();
        self
    }

    /// Replaces the authenticator used for subsequent calls.
    pub fn set_authenticator(&mut self, authenticator: impl Authenticator + 'static) -> &mut Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Establishes credentials with the configured authenticator.
    ///
    /// Fails before returning the future if no authenticator is configured.
    pub fn authorize(&self) -> Result<impl Future<Output = Result<()>> + '_> {
        let authenticator = self.authenticator.as_ref().ok_or_else(|| {
            DispatchError::Configuration("cannot authorize without an authenticator".to_owned())
        })?;
        Ok(authenticator.establish_authorization())
    }

    /// Full URL for an API path, e.g. `"/tasks/1"`.
    ///
    /// Example: `"/users/me"` → `"https://app.asana.com/api/1.0/users/me"`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PATH, path)
    }

    /// Diagnostic facts sent with every request, collected on first use.
    pub fn version_info(&self) -> &VersionInfo {
        self.version_info
            .get_or_init(|| self.diagnostics.collect())
    }

    /// Sends a GET request with optional query parameters.
    pub async fn get(
        &self,
        path: &str,
        query: Option<&[(&str, &str)]>,
        options: Option<&DispatchOptions>,
    ) -> Result<Value> {
        let mut request = self.request_spec(Method::Get, path);
        request.query = query.map(|pairs| {
            pairs
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect()
        });
        self.dispatch(request, options).await
    }

    /// Sends a POST request with `data` wrapped as `{"data": ...}`.
    pub async fn post(
        &self,
        path: &str,
        data: Value,
        options: Option<&DispatchOptions>,
    ) -> Result<Value> {
        let mut request = self.request_spec(Method::Post, path);
        request.body = Some(Body::Json(json!({ "data": data })));
        self.dispatch(request, options).await
    }

    /// Sends a PUT request with `data` wrapped as `{"data": ...}`.
    pub async fn put(
        &self,
        path: &str,
        data: Value,
        options: Option<&DispatchOptions>,
    ) -> Result<Value> {
        let mut request = self.request_spec(Method::Put, path);
        request.body = Some(Body::Json(json!({ "data": data })));
        self.dispatch(request, options).await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, path: &str, options: Option<&DispatchOptions>) -> Result<Value> {
        let request = self.request_spec(Method::Delete, path);
        self.dispatch(request, options).await
    }

    /// Runs the attempt loop for a prepared request.
    ///
    /// Resolves with the parsed payload, or with exactly one terminal error.
    /// Transport failures are never retried.
    pub async fn dispatch(
        &self,
        mut request: RequestSpec,
        options: Option<&DispatchOptions>,
    ) -> Result<Value> {
        let policy = RetryPolicy {
            retry_on_rate_limit: self.retry_on_rate_limit,
            handle_unauthorized: !matches!(self.handle_unauthorized, UnauthorizedHandling::Disabled),
        };
        let mut state = AttemptState::Attempting;
        #[cfg(feature = "tracing")]
        let mut attempt = 0usize;

        loop {
            state = match state {
                AttemptState::Attempting => {
                    self.prepare_attempt(&mut request, options);

                    #[cfg(feature = "tracing")]
                    {
                        attempt += 1;
                        tracing::debug!(
                            method = %request.method,
                            url = %request.url,
                            attempt,
                            "dispatching request"
                        );
                    }

                    match self.transport.send(&request).await {
                        Ok(response) => {
                            AttemptState::after_response(&response, &self.classifier, policy)
                        }
                        Err(err) => AttemptState::Failed(DispatchError::Transport(err)),
                    }
                }
                AttemptState::RateLimitWait(delay) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("rate limited, retrying request after {} ms", delay.as_millis());

                    sleep(delay).await;
                    AttemptState::Attempting
                }
                AttemptState::ReauthPending(original) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("unauthorized, attempting reauthorization");

                    let signal = self.reauthorize().await;
                    AttemptState::after_reauthorization(signal, original)
                }
                AttemptState::Succeeded(payload) => return Ok(payload),
                AttemptState::Failed(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %error, "request failed");

                    return Err(error);
                }
            };
        }
    }

    fn request_spec(&self, method: Method, path: &str) -> RequestSpec {
        let mut request = RequestSpec::new(method, self.url(path));
        request.timeout = self.request_timeout;
        request.proxy = self.default_proxy.clone();
        request
    }

    /// Decorates and merges headers; later sources win on collision:
    /// authenticator, default headers, per-call headers, diagnostic header.
    fn prepare_attempt(&self, request: &mut RequestSpec, options: Option<&DispatchOptions>) {
        if let Some(authenticator) = &self.authenticator {
            authenticator.authenticate_request(request);
        }
        for (name, value) in &self.default_headers {
            request.set_header(name.as_str(), value.as_str());
        }
        if let Some(options) = options {
            for (name, value) in &options.headers {
                request.set_header(name.as_str(), value.as_str());
            }
        }
        request.set_header(CLIENT_LIB_HEADER, self.version_info().header_value());
    }

    async fn reauthorize(&self) -> Result<bool> {
        match &self.handle_unauthorized {
            UnauthorizedHandling::Custom(handler) => handler.handle_unauthorized().await,
            UnauthorizedHandling::Reauthorize => match &self.authenticator {
                Some(authenticator) => authenticator.refresh_credentials().await,
                None => Ok(false),
            },
            UnauthorizedHandling::Disabled => Ok(false),
        }
    }
}
