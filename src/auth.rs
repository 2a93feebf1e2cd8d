use std::{fmt, future::Future};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{request::RequestSpec, DispatchError, Result};

/// Holds credentials and attaches them to outgoing requests.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Authenticator: Send + Sync {
    /// Decorates `request` with credentials. Called before every attempt.
    fn authenticate_request(&self, request: &mut RequestSpec);

    /// Establishes credentials. Fails if that is impossible.
    async fn establish_authorization(&self) -> Result<()>;

    /// Refreshes credentials; `Ok(true)` means the request is worth replaying.
    async fn refresh_credentials(&self) -> Result<bool>;
}

/// Decides whether a request rejected with 401 should be replayed.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait UnauthorizedHandler: Send + Sync {
    async fn handle_unauthorized(&self) -> Result<bool>;
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<F, Fut> UnauthorizedHandler for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    async fn handle_unauthorized(&self) -> Result<bool> {
        (self)().await
    }
}

/// API key sent as HTTP basic auth with an empty password.
#[derive(Clone)]
pub struct BasicAuthenticator {
    authorization: String,
}

impl BasicAuthenticator {
    pub fn new(api_key: impl AsRef<str>) -> Self {
        let encoded = STANDARD.encode(format!("{}:", api_key.as_ref()));
        Self {
            authorization: format!("Basic {encoded}"),
        }
    }
}

impl fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Authenticator for BasicAuthenticator {
    fn authenticate_request(&self, request: &mut RequestSpec) {
        request.set_header("Authorization", self.authorization.clone());
    }

    async fn establish_authorization(&self) -> Result<()> {
        Ok(())
    }

    // A static key stays the same on refresh; replaying would hit 401 again.
    async fn refresh_credentials(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Personal access token or pre-issued OAuth access token.
#[derive(Clone)]
pub struct BearerAuthenticator {
    authorization: String,
}

impl BearerAuthenticator {
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self {
            authorization: normalize_bearer_authorization(token.as_ref()),
        }
    }
}

impl fmt::Debug for BearerAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Authenticator for BearerAuthenticator {
    fn authenticate_request(&self, request: &mut RequestSpec) {
        request.set_header("Authorization", self.authorization.clone());
    }

    async fn establish_authorization(&self) -> Result<()> {
        let token = self.authorization.get("Bearer ".len()..).unwrap_or_default();
        if token.trim().is_empty() {
            return Err(DispatchError::Configuration(
                "bearer token is empty".to_owned(),
            ));
        }
        Ok(())
    }

    async fn refresh_credentials(&self) -> Result<bool> {
        Ok(false)
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_bearer_authorization, Authenticator, BasicAuthenticator, BearerAuthenticator};
    use crate::request::{Method, RequestSpec};

    fn spec() -> RequestSpec {
        RequestSpec::new(Method::Get, "https://app.asana.com/api/1.0/users/me")
    }

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn basic_auth_encodes_key_with_empty_password() {
        let mut request = spec();
        BasicAuthenticator::new("key").authenticate_request(&mut request);
        // base64("key:")
        assert_eq!(request.header("authorization"), Some("Basic a2V5Og=="));
    }

    #[test]
    fn debug_redacts_credentials() {
        let debug = format!(
            "{:?} {:?}",
            BasicAuthenticator::new("secret-key"),
            BearerAuthenticator::new("secret-token")
        );
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret"));
    }

    #[tokio::test]
    async fn empty_bearer_token_cannot_be_established() {
        assert!(BearerAuthenticator::new("  ")
            .establish_authorization()
            .await
            .is_err());
        assert!(BearerAuthenticator::new("token")
            .establish_authorization()
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn static_credentials_never_refresh() {
        assert!(!BasicAuthenticator::new("key")
            .refresh_credentials()
            .await
            .expect("refresh must not fail"));
        assert!(!BearerAuthenticator::new("token")
            .refresh_credentials()
            .await
            .expect("refresh must not fail"));
    }
}
