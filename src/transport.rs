use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::request::{Body, Method, RequestSpec};

/// Status, headers and body text of one exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parses the body as JSON.
    ///
    /// Empty bodies become `Value::Null`; bodies that are not JSON are kept
    /// as `Value::String`.
    pub fn payload(&self) -> Value {
        if self.body.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

/// Performs one physical HTTP exchange.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, reqwest::Error>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Requests that name a proxy are sent through a client built for that
/// proxy; those clients are cached per proxy URL. Proxies are ignored on
/// `wasm32`, where the browser owns networking.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    #[cfg(not(target_arch = "wasm32"))]
    proxied: Arc<Mutex<HashMap<String, reqwest::Client>>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client for requests without a proxy.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            #[cfg(not(target_arch = "wasm32"))]
            proxied: Arc::default(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
        let Some(proxy) = proxy else {
            return Ok(self.http.clone());
        };

        let mut proxied = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = proxied.get(proxy) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy)?)
            .build()?;
        proxied.insert(proxy.to_owned(), client.clone());
        Ok(client)
    }

    #[cfg(target_arch = "wasm32")]
    fn client_for(&self, _proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
        Ok(self.http.clone())
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<RawResponse, reqwest::Error> {
        let client = self.client_for(request.proxy.as_deref())?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(query) = &request.query {
            builder = builder.query(query);
        }
        builder = match &request.body {
            Some(Body::Json(value)) => builder.json(value),
            Some(Body::Raw(text)) => builder.body(text.clone()),
            None => builder,
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned()))
            })
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{json, Value};

    use super::RawResponse;
    #[cfg(not(target_arch = "wasm32"))]
    use super::ReqwestTransport;

    fn response(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            headers: HashMap::from([("retry-after".to_owned(), "3".to_owned())]),
            body: body.to_owned(),
        }
    }

    #[test]
    fn payload_parses_json_body() {
        assert_eq!(
            response(r#"{"data":{"id":1}}"#).payload(),
            json!({"data": {"id": 1}})
        );
    }

    #[test]
    fn payload_keeps_non_json_body_as_string() {
        assert_eq!(
            response("Bad Gateway").payload(),
            Value::String("Bad Gateway".to_owned())
        );
    }

    #[test]
    fn payload_of_empty_body_is_null() {
        assert_eq!(response("  ").payload(), Value::Null);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        assert_eq!(response("").header("Retry-After"), Some("3"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn proxied_clients_are_cached_per_proxy_url() {
        let transport = ReqwestTransport::new();
        transport
            .client_for(Some("http://127.0.0.1:3128"))
            .expect("valid proxy");
        transport
            .client_for(Some("http://127.0.0.1:3128"))
            .expect("valid proxy");
        transport.client_for(None).expect("direct client");
        assert_eq!(transport.proxied.lock().expect("lock").len(), 1);

        transport
            .client_for(Some("http://127.0.0.1:8080"))
            .expect("valid proxy");
        assert_eq!(transport.proxied.lock().expect("lock").len(), 2);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn invalid_proxy_is_an_error_and_not_cached() {
        let transport = ReqwestTransport::new();
        assert!(transport.client_for(Some("not a url")).is_err());
        assert!(transport.proxied.lock().expect("lock").is_empty());
    }
}
