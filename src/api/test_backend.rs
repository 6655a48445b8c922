//! Implements the `Transport` trait with an in-memory imitation of the expense service.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a running service (see `Mode::Test`).

use crate::api::{
    ApiRequest, ApiResponse, Method, Transport, CATEGORY, EXPENSES, LOGIN, LOGOUT, USERS,
};
use crate::model::same_category;
use crate::Result;
use anyhow::bail;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// The user the seed data belongs to.
pub(crate) const TEST_USERNAME: &str = "demo";
pub(crate) const TEST_PASSWORD: &str = "demo";

/// Which of the two grouping shapes `GET /expenses` answers with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PayloadShape {
    /// `{"categoryWiseExpenses": {"Food": [...]}}`
    #[default]
    Map,
    /// `{"expenseCategoryWiseList": [{"categoryName": "Food", "expenses": [...]}]}`
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredExpense {
    pub(crate) id: String,
    pub(crate) category: String,
    pub(crate) amount: Value,
    pub(crate) description: String,
    pub(crate) date: String,
}

impl StoredExpense {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "amount": self.amount,
            "description": self.description,
            "date": self.date,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TestUser {
    pub(crate) password: String,
    pub(crate) categories: Vec<String>,
    pub(crate) expenses: Vec<StoredExpense>,
    pub(crate) revoked: bool,
    next_id: u64,
}

impl TestUser {
    fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            next_id: 1,
            ..Default::default()
        }
    }

    fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|c| same_category(c, name))
    }

    fn push_expense(&mut self, category: &str, amount: Value, description: &str, date: &str) {
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.expenses.push(StoredExpense {
            id,
            category: category.to_string(),
            amount,
            description: description.to_string(),
            date: date.to_string(),
        });
    }

    /// Expenses grouped by the exact category string they were stored under. Every known category
    /// appears, even when it has no expenses.
    fn groups(&self) -> Vec<(String, Vec<Value>)> {
        let mut groups: Vec<(String, Vec<Value>)> = self
            .categories
            .iter()
            .map(|c| (c.clone(), Vec::new()))
            .collect();
        for expense in &self.expenses {
            match groups.iter_mut().find(|(name, _)| *name == expense.category) {
                Some((_, list)) => list.push(expense.to_json()),
                None => groups.push((expense.category.clone(), vec![expense.to_json()])),
            }
        }
        groups
    }
}

/// Everything the fake service knows, plus a log of the requests it received.
#[derive(Debug, Clone)]
pub(crate) struct TestBackendState {
    pub(crate) users: BTreeMap<String, TestUser>,
    pub(crate) shape: PayloadShape,
    pub(crate) requests: Vec<ApiRequest>,
    /// When set, every request fails as if the service could not be reached.
    pub(crate) offline: bool,
}

impl Default for TestBackendState {
    /// Seeds the `demo` user with a few categories and expenses.
    fn default() -> Self {
        let mut state = Self::empty();
        state.add_user(TEST_USERNAME, TEST_PASSWORD);
        if let Some(user) = state.users.get_mut(TEST_USERNAME) {
            user.categories = SEED_CATEGORIES.iter().map(|c| c.to_string()).collect();
            for (category, amount, description, date) in SEED_EXPENSES {
                user.push_expense(category, json!(amount), description, date);
            }
        }
        state
    }
}

impl TestBackendState {
    pub(crate) fn empty() -> Self {
        Self {
            users: BTreeMap::new(),
            shape: PayloadShape::default(),
            requests: Vec::new(),
            offline: false,
        }
    }

    pub(crate) fn add_user(&mut self, username: &str, password: &str) {
        self.users
            .insert(username.to_string(), TestUser::new(password));
    }

    /// Invalidates every issued token, as if all sessions had expired.
    #[cfg(test)]
    pub(crate) fn revoke_tokens(&mut self) {
        for user in self.users.values_mut() {
            user.revoked = true;
        }
    }

    /// Stores an expense exactly as given, without the checks `POST /expenses` applies.
    #[cfg(test)]
    pub(crate) fn push_raw_expense(&mut self, username: &str, category: &str, amount: Value) {
        if let Some(user) = self.users.get_mut(username) {
            user.push_expense(category, amount, "", "");
        }
    }

    fn handle(&mut self, request: &ApiRequest) -> ApiResponse {
        match (request.method, request.path.as_str()) {
            (Method::Put, LOGIN) => self.login(request),
            (Method::Post, LOGOUT) => self.logout(request),
            (Method::Get, USERS) => self.get_user(request),
            (Method::Get, EXPENSES) => self.get_expenses(request),
            (Method::Post, CATEGORY) => self.add_category(request),
            (Method::Delete, CATEGORY) => self.delete_category(request),
            (Method::Post, EXPENSES) => self.add_expense(request),
            (Method::Delete, EXPENSES) => self.delete_expense(request),
            (method, path) => message(404, &format!("No route for {method} {path}")),
        }
    }

    fn login(&mut self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or_default();
        let username = body["username"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();
        match self.users.get_mut(username) {
            Some(user) if user.password == password => {
                user.revoked = false;
                ApiResponse::new(200, token_for(username))
            }
            _ => message(401, "Invalid username or password"),
        }
    }

    fn logout(&mut self, request: &ApiRequest) -> ApiResponse {
        if let Some(username) = self.bearer_user(request) {
            if let Some(user) = self.users.get_mut(&username) {
                user.revoked = true;
            }
        }
        ApiResponse::json(200, &json!({}))
    }

    fn get_user(&mut self, request: &ApiRequest) -> ApiResponse {
        let user = match self.authorize(request, request.query_value("username")) {
            Ok(user) => user,
            Err(response) => return response,
        };
        ApiResponse::json(200, &json!({ "categories": user.categories }))
    }

    fn get_expenses(&mut self, request: &ApiRequest) -> ApiResponse {
        let shape = self.shape;
        let user = match self.authorize(request, request.query_value("username")) {
            Ok(user) => user,
            Err(response) => return response,
        };
        let groups = user.groups();
        let body = match shape {
            PayloadShape::Map => {
                let map: Map<String, Value> = groups
                    .into_iter()
                    .map(|(name, list)| (name, Value::Array(list)))
                    .collect();
                json!({ "categoryWiseExpenses": map })
            }
            PayloadShape::List => {
                let list: Vec<Value> = groups
                    .into_iter()
                    .map(|(name, list)| json!({ "categoryName": name, "expenses": list }))
                    .collect();
                json!({ "expenseCategoryWiseList": list })
            }
        };
        ApiResponse::json(200, &body)
    }

    fn add_category(&mut self, request: &ApiRequest) -> ApiResponse {
        let user = match self.authorize(request, request.query_value("username")) {
            Ok(user) => user,
            Err(response) => return response,
        };
        let name = request.query_value("category").unwrap_or_default().trim();
        if name.is_empty() {
            return message(400, "Category name is required");
        }
        if user.has_category(name) {
            return message(409, "Category already exists");
        }
        user.categories.push(name.to_string());
        ApiResponse::json(200, &json!({ "categories": user.categories }))
    }

    fn delete_category(&mut self, request: &ApiRequest) -> ApiResponse {
        let user = match self.authorize(request, request.query_value("username")) {
            Ok(user) => user,
            Err(response) => return response,
        };
        let name = request.query_value("category").unwrap_or_default();
        if !user.has_category(name) {
            return message(404, "Category not found");
        }
        user.categories.retain(|c| !same_category(c, name));
        user.expenses.retain(|e| !same_category(&e.category, name));
        ApiResponse::json(200, &json!({ "categories": user.categories }))
    }

    fn add_expense(&mut self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or_default();
        let user = match self.authorize(request, body["username"].as_str()) {
            Ok(user) => user,
            Err(response) => return response,
        };
        let category = body["category"].as_str().unwrap_or_default();
        if !user.has_category(category) {
            return message(400, "Category not found");
        }
        if !body["amount"].is_number() {
            return message(400, "Amount must be a number");
        }
        user.push_expense(
            category,
            body["amount"].clone(),
            body["description"].as_str().unwrap_or_default(),
            body["date"].as_str().unwrap_or_default(),
        );
        let stored = user.expenses.last().map(StoredExpense::to_json);
        ApiResponse::json(201, &stored.unwrap_or_default())
    }

    fn delete_expense(&mut self, request: &ApiRequest) -> ApiResponse {
        let user = match self.authorize(request, request.query_value("username")) {
            Ok(user) => user,
            Err(response) => return response,
        };
        let id = request.query_value("expenseId").unwrap_or_default();
        let before = user.expenses.len();
        user.expenses.retain(|e| e.id != id);
        if user.expenses.len() == before {
            return message(404, "Expense not found");
        }
        ApiResponse::new(204, "")
    }

    /// The user whose unrevoked token the request carries.
    fn bearer_user(&self, request: &ApiRequest) -> Option<String> {
        let token = request.bearer.as_deref()?;
        self.users
            .iter()
            .find(|(name, user)| !user.revoked && token_for(name) == token)
            .map(|(name, _)| name.clone())
    }

    /// 401 without a valid token, 403 when the token belongs to someone other than `username`.
    fn authorize(
        &mut self,
        request: &ApiRequest,
        username: Option<&str>,
    ) -> std::result::Result<&mut TestUser, ApiResponse> {
        let Some(owner) = self.bearer_user(request) else {
            return Err(message(401, "Unauthorized"));
        };
        if username != Some(owner.as_str()) {
            return Err(message(403, "Forbidden"));
        }
        self.users
            .get_mut(&owner)
            .ok_or_else(|| message(401, "Unauthorized"))
    }
}

/// A handle to a `TestBackendState`. Clones share the same state.
#[derive(Debug, Clone)]
pub(crate) struct TestBackend {
    state: Arc<Mutex<TestBackendState>>,
}

impl TestBackend {
    #[cfg(test)]
    pub(crate) fn new(state: TestBackendState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// The backend registered under `key`, created with seed data on first use. Every call with
    /// the same key, for the life of the process, sees the same state.
    pub(crate) fn shared(key: &str) -> Self {
        let mut registry = registry().lock().unwrap_or_else(PoisonError::into_inner);
        let state = registry
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TestBackendState::default())))
            .clone();
        Self { state }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, TestBackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Transport for TestBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut state = self.state();
        state.requests.push(request.clone());
        if state.offline {
            bail!("Connection refused");
        }
        Ok(state.handle(&request))
    }
}

fn registry() -> &'static Mutex<HashMap<String, Arc<Mutex<TestBackendState>>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Mutex<TestBackendState>>>>> =
        OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

fn token_for(username: &str) -> String {
    format!("test-token-{username}")
}

fn message(status: u16, message: &str) -> ApiResponse {
    ApiResponse::json(status, &json!({ "message": message }))
}

const SEED_CATEGORIES: &[&str] = &[
    "Groceries",
    "Coffee Shops",
    "Gas & Fuel",
    "Restaurants",
    "Utilities",
];

/// Seed expenses. Some are stored under a different casing than the category list uses.
const SEED_EXPENSES: &[(&str, f64, &str, &str)] = &[
    ("Groceries", 87.43, "Whole Foods Market", "2025-10-20T12:00:00.000Z"),
    ("Coffee Shops", 6.75, "Starbucks #2847", "2025-10-19T08:45:12.000Z"),
    ("Gas & Fuel", 52.30, "Shell Gas Station", "2025-10-18T07:22:45.000Z"),
    ("Restaurants", 14.85, "Chipotle Mexican Grill", "2025-10-17T12:35:20.000Z"),
    ("Utilities", 142.67, "PG&E Electric", "2025-10-16T06:00:00.000Z"),
    ("groceries", 63.21, "Trader Joe's #429", "2025-10-15T16:18:33.000Z"),
    ("coffee shops", 7.25, "Peet's Coffee & Tea", "2025-10-14T09:22:18.000Z"),
];
