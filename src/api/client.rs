use crate::api::{
    bypasses_gate, ApiRequest, ApiResponse, AuthGate, Method, Transport, CATEGORY, EXPENSES,
    LOGIN, LOGOUT, USERS,
};
use crate::error::ApiError;
use crate::model::{ExpensesResponse, NewExpense, UserResponse};
use crate::session::SessionStore;
use crate::Result;
use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

const LOGIN_FAILED: &str = "Login failed. Please try again.";

/// The expense service's endpoints on top of a `Transport`.
///
/// Every request carries the session's bearer token when there is one. An authorization failure
/// (401 or 403) from anything but the login, register and logout endpoints ends the session and
/// asks the `AuthGate` whether to send the user back to login. Nothing is retried.
pub struct Client {
    transport: Box<dyn Transport>,
    session: SessionStore,
    gate: Arc<AuthGate>,
}

impl Client {
    pub fn new(transport: Box<dyn Transport>, session: SessionStore, gate: AuthGate) -> Self {
        Self {
            transport,
            session,
            gate: Arc::new(gate),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// `PUT /auth/login`. Returns the token the service issued.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let request = ApiRequest::new(Method::Put, LOGIN)
            .json(json!({ "username": username, "password": password }));
        let response = self.send(request).await?;
        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| LOGIN_FAILED.to_string());
            return Err(ApiError::Backend {
                status: response.status,
                message,
            }
            .into());
        }
        parse_token(&response.body)
    }

    /// `POST /auth/logout`.
    pub async fn logout(&self) -> Result<()> {
        let request = ApiRequest::new(Method::Post, LOGOUT).json(json!({}));
        self.execute(request).await.map(|_| ())
    }

    /// `GET /users`: the user's categories.
    pub async fn user(&self, username: &str) -> Result<UserResponse> {
        let request = ApiRequest::new(Method::Get, USERS).query("username", username);
        let response = self.execute(request).await?;
        decode(USERS, &response)
    }

    /// `GET /expenses`: the user's expenses grouped by category.
    pub async fn expenses(&self, username: &str) -> Result<ExpensesResponse> {
        let request = ApiRequest::new(Method::Get, EXPENSES).query("username", username);
        let response = self.execute(request).await?;
        decode(EXPENSES, &response)
    }

    pub async fn add_category(&self, username: &str, category: &str) -> Result<()> {
        let request = ApiRequest::new(Method::Post, CATEGORY)
            .query("username", username)
            .query("category", category);
        self.execute(request).await.map(|_| ())
    }

    pub async fn delete_category(&self, username: &str, category: &str) -> Result<()> {
        let request = ApiRequest::new(Method::Delete, CATEGORY)
            .query("username", username)
            .query("category", category);
        self.execute(request).await.map(|_| ())
    }

    pub async fn add_expense(&self, expense: &NewExpense) -> Result<()> {
        let body = serde_json::to_value(expense).context("Unable to serialize the expense")?;
        let request = ApiRequest::new(Method::Post, EXPENSES).json(body);
        self.execute(request).await.map(|_| ())
    }

    pub async fn delete_expense(&self, username: &str, expense_id: &str) -> Result<()> {
        let request = ApiRequest::new(Method::Delete, EXPENSES)
            .query("expenseId", expense_id)
            .query("username", username);
        self.execute(request).await.map(|_| ())
    }

    /// Sends `request` and fails on any non-success status.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let response = self.send(request).await?;
        if response.is_success() {
            return Ok(response);
        }
        let message = response.error_message().unwrap_or_else(|| {
            format!("The expense service answered with HTTP {}", response.status)
        });
        Err(ApiError::Backend {
            status: response.status,
            message,
        }
        .into())
    }

    /// Attaches the bearer token, sends `request` and applies the authorization gate. Statuses
    /// other than a gated 401/403 are returned as they are.
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        request.bearer = self.session.token().await;
        let method = request.method;
        let path = request.path.clone();
        trace!("Sending {method} {path}");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|source| ApiError::Transport {
                path: path.clone(),
                source: source.into(),
            })?;
        debug!("{method} {path} -> {}", response.status);

        if response.is_authorization_failure() && !bypasses_gate(&path) {
            return Err(self.on_authorization_failure(response.status, path).await.into());
        }
        Ok(response)
    }

    async fn on_authorization_failure(&self, status: u16, path: String) -> ApiError {
        match self.session.teardown().await {
            Ok(true) => debug!("Session ended by HTTP {status} from {path}"),
            Ok(false) => {}
            Err(e) => error!("Unable to remove the stored session: {e:#}"),
        }
        let redirected = self.gate.on_authorization_failure();
        if redirected {
            warn!("Your session has ended, please run 'expenses login' to sign in again");
        }
        ApiError::Unauthorized {
            status,
            path,
            redirected,
        }
    }
}

fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T> {
    serde_json::from_str(&response.body).map_err(|source| {
        ApiError::Decode {
            path: path.to_string(),
            source,
        }
        .into()
    })
}

/// The login endpoint answers with the bare token, a JSON string or `{"token": ...}`.
fn parse_token(body: &str) -> Result<String> {
    let text = body.trim();
    let token = match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => map
            .get("token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => text.to_string(),
    };
    if token.trim().is_empty() {
        bail!("The login response did not contain a token");
    }
    Ok(token)
}
