//! `asana-dispatch` is an authenticated async request dispatcher for the
//! Asana REST API.
//!
//! [`Dispatcher`] builds requests, attaches credentials and the
//! `X-Asana-Client-Lib` diagnostic header, classifies error responses into
//! [`DispatchError`] and transparently retries two recoverable conditions:
//! - rate limiting (429), when [`DispatcherOptions::retry_on_rate_limit`] is set
//! - expired authorization (401), via [`UnauthorizedHandling`]
//!
//! Verbs: [`Dispatcher::get`], [`Dispatcher::post`], [`Dispatcher::put`],
//! [`Dispatcher::delete`].

mod attempt;
mod auth;
mod classify;
mod dispatcher;
mod error;
mod options;
mod request;
mod transport;
mod version;

pub use attempt::RATE_LIMIT_MARGIN;
pub use auth::{Authenticator, BasicAuthenticator, BearerAuthenticator, UnauthorizedHandler};
pub use classify::{ErrorClassifier, ErrorKind};
pub use dispatcher::{Dispatcher, API_PATH};
pub use error::DispatchError;
pub use options::{DispatchOptions, DispatcherOptions, UnauthorizedHandling, DEFAULT_BASE_URL};
pub use request::{Body, Method, RequestSpec};
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use version::{DiagnosticsProvider, VersionInfo, CLIENT_LIB_HEADER};

#[cfg(not(target_arch = "wasm32"))]
pub use version::NativeDiagnostics;
#[cfg(target_arch = "wasm32")]
pub use version::WasmDiagnostics;

pub type Result<T> = std::result::Result<T, DispatchError>;
