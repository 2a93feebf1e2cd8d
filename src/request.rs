use std::{collections::HashMap, fmt, time::Duration};

use serde_json::Value;

/// HTTP verbs the dispatcher issues.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(Value),
    /// Sent verbatim.
    Raw(String),
}

/// Everything needed for one physical attempt.
///
/// Owned by a single dispatch; authenticators may rewrite `headers` between
/// attempts.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: Option<Vec<(String, String)>>,
    pub body: Option<Body>,
    pub timeout: Option<Duration>,
    pub proxy: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            query: None,
            body: None,
            timeout: None,
            proxy: None,
        }
    }

    /// Inserts a header, replacing any existing value whose name matches
    /// case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{Method, RequestSpec};

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut spec = RequestSpec::new(Method::Get, "https://app.asana.com/api/1.0/users/me");
        spec.set_header("authorization", "Bearer old");
        spec.set_header("Authorization", "Bearer new");

        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.header("AUTHORIZATION"), Some("Bearer new"));
    }
}
