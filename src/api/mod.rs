//! Talks to the expense service.
//!
//! `Transport` is the seam: it sends one `ApiRequest` and returns the raw `ApiResponse`. The
//! production implementation uses `reqwest`; `TestBackend` fakes the service in memory. `Client`
//! sits on top and knows the endpoints, the bearer token and what to do about authorization
//! failures.

mod client;
mod gate;
mod http;
mod test_backend;

pub use client::Client;
pub use gate::{bypasses_gate, AuthGate};
pub(crate) use http::HttpTransport;
pub(crate) use test_backend::TestBackend;
#[cfg(test)]
pub(crate) use test_backend::{PayloadShape, TestBackendState, TEST_PASSWORD, TEST_USERNAME};

use crate::session::SessionStore;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub(crate) const LOGIN: &str = "/auth/login";
pub(crate) const REGISTER: &str = "/auth/register";
pub(crate) const LOGOUT: &str = "/auth/logout";
pub(crate) const USERS: &str = "/users";
pub(crate) const EXPENSES: &str = "/expenses";
pub(crate) const CATEGORY: &str = "/categories/category";

const TEST_MODE_ENV: &str = "EXPENSES_IN_TEST_MODE";

/// Selects which `Transport` the client uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Talk to the real service over HTTP.
    #[default]
    Http,
    /// Use the in-memory `TestBackend` keyed by the configured base URL.
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);

impl Mode {
    /// `Mode::Test` when `EXPENSES_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Http`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Http,
        }
    }
}

/// Builds a `Client` for `config` using the transport that `mode` selects.
pub fn client(config: &Config, session: SessionStore, mode: Mode) -> Result<Client> {
    debug!("Using {mode} transport for {}", config.base_url());
    let transport: Box<dyn Transport> = match mode {
        Mode::Http => Box::new(HttpTransport::new(config.base_url().clone())?),
        Mode::Test => Box::new(TestBackend::shared(config.base_url().as_str())),
    };
    Ok(Client::new(
        transport,
        session,
        AuthGate::new(config.redirect_cooldown()),
    ))
}

/// The HTTP methods the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

serde_plain::derive_display_from_serialize!(Method);

/// One request to the service. `path` is relative to the base URL and starts with `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The status and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_authorization_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// A human-readable message from an error body: the `message` field of a JSON object, a JSON
    /// string, or the raw text. `None` when the body says nothing useful.
    pub fn error_message(&self) -> Option<String> {
        let text = self.body.trim();
        if text.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string),
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Ok(_) => None,
            Err(_) => Some(text.to_string()),
        }
    }
}

/// Sends requests to the expense service, or something pretending to be it.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and returns whatever status the service answered with. An `Err` means no
    /// response was received at all.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_variants() {
        let object = ApiResponse::json(400, &json!({"message": "Expense not found"}));
        assert_eq!(object.error_message().as_deref(), Some("Expense not found"));

        let string = ApiResponse::new(400, "\"Bad category\"");
        assert_eq!(string.error_message().as_deref(), Some("Bad category"));

        let text = ApiResponse::new(500, "Internal Server Error");
        assert_eq!(
            text.error_message().as_deref(),
            Some("Internal Server Error")
        );

        assert_eq!(ApiResponse::new(500, "  ").error_message(), None);
        assert_eq!(
            ApiResponse::json(500, &json!({"error": "x"})).error_message(),
            None
        );
    }

    #[test]
    fn test_status_classes() {
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(302, "").is_success());
        assert!(ApiResponse::new(401, "").is_authorization_failure());
        assert!(ApiResponse::new(403, "").is_authorization_failure());
        assert!(!ApiResponse::new(404, "").is_authorization_failure());
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::new(Method::Delete, EXPENSES)
            .query("expenseId", "42")
            .query("username", "alice");
        assert_eq!(request.query_value("expenseId"), Some("42"));
        assert_eq!(request.query_value("missing"), None);
        assert_eq!(request.method().to_string(), "DELETE");
    }
}
