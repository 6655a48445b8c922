//! The expense tracker: one user's categories and expenses, kept in step with the service.
//!
//! Every mutation is one request followed by an awaited full reload; nothing is updated
//! optimistically. A failed operation records its message in the snapshot and leaves the
//! categories and expenses as they were.

use crate::api::{self, Client, Mode};
use crate::error::ApiError;
use crate::model::{normalize, Amount, CategoryMap, Expense, ExpenseDraft, Snapshot};
use crate::session::{Session, SessionStore};
use crate::{Config, Result};
use anyhow::bail;
use chrono::{Local, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Holds the current `Snapshot` and performs every operation that changes it.
///
/// All methods take `&self`, so independent operations can run concurrently. Only a completed
/// reload replaces the snapshot's data, and the last one to complete wins.
pub struct ExpenseTracker {
    client: Client,
    snapshot: Arc<Mutex<Snapshot>>,
    /// Reloads started but not finished. `loading` stays set until this drops back to zero.
    reloads: AtomicUsize,
}

impl ExpenseTracker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            snapshot: Arc::new(Mutex::new(Snapshot::default())),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Loads the stored session for `config` and connects using the transport `mode` selects.
    pub async fn open(config: &Config, mode: Mode) -> Result<Self> {
        let session = SessionStore::load(config.session_path()).await;
        let client = api::client(config, session, mode)?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn session(&self) -> &SessionStore {
        self.client.session()
    }

    /// A copy of the current snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().await.clone()
    }

    /// Signs in, stores the session and loads the user's data.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            bail!("A username and password are required");
        }
        let token = self.client.login(username, password).await?;
        self.session()
            .establish(Session::new(username, token)?)
            .await?;
        info!("Signed in as {username}");
        self.initialize_session().await
    }

    /// Loads the data for a stored session. Does nothing when there is no session.
    pub async fn initialize_session(&self) -> Result<()> {
        match self.session().username().await {
            Some(username) => {
                debug!("Resuming the session for {username}");
                self.reload().await
            }
            None => {
                debug!("No stored session");
                Ok(())
            }
        }
    }

    /// Fetches the categories and then the expenses and swaps them in together. On failure the
    /// previous data stays and the error is recorded.
    pub async fn reload(&self) -> Result<()> {
        let username = self.require_username().await?;
        self.begin_reload().await;

        let result = self.fetch(&username).await;

        let mut snapshot = self.finish_reload().await;
        match result {
            Ok((categories, expenses)) => {
                debug!(
                    "Loaded {} categories and {} expenses",
                    categories.len(),
                    expenses.len()
                );
                snapshot.categories = categories;
                snapshot.expenses = expenses;
                Ok(())
            }
            Err(e) => {
                Self::record(&mut snapshot, &e);
                Err(e)
            }
        }
    }

    pub async fn add_category(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("A category name is required");
        }
        let username = self.require_username().await?;
        self.mutate(self.client.add_category(&username, name)).await
    }

    /// Deletes the category, matched case-insensitively against the known categories.
    pub async fn delete_category(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            bail!("A category name is required");
        }
        let username = self.require_username().await?;
        let name = self
            .snapshot
            .lock()
            .await
            .categories
            .resolve(name)
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());
        self.mutate(self.client.delete_category(&username, &name))
            .await
    }

    /// Validates `draft` against the known categories and adds it. Nothing is sent when the draft
    /// is invalid.
    pub async fn add_expense(&self, draft: &ExpenseDraft) -> Result<()> {
        let username = self.require_username().await?;
        let categories = self.snapshot.lock().await.categories.clone();
        let expense = draft.validate(&username, &categories, &Local, Utc::now())?;
        debug!(
            "Adding {} to {} for {}",
            expense.amount, expense.category, expense.username
        );
        self.mutate(self.client.add_expense(&expense)).await
    }

    pub async fn delete_expense(&self, id: &str) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            bail!("An expense id is required");
        }
        let username = self.require_username().await?;
        self.mutate(self.client.delete_expense(&username, id)).await
    }

    /// Tells the service (best effort), ends the session and discards the snapshot.
    pub async fn logout(&self) -> Result<()> {
        if self.session().current().await.is_some() {
            if let Err(e) = self.client.logout().await {
                warn!("Ignoring logout failure: {e:#}");
            }
        }
        self.session().teardown().await?;
        *self.snapshot.lock().await = Snapshot::default();
        Ok(())
    }

    pub async fn expenses_for_category(&self, name: &str) -> Vec<Expense> {
        self.snapshot
            .lock()
            .await
            .expenses_for_category(name)
            .cloned()
            .collect()
    }

    pub async fn total_for_category(&self, name: &str) -> Amount {
        self.snapshot.lock().await.total_for_category(name)
    }

    pub async fn grand_total(&self) -> Amount {
        self.snapshot.lock().await.grand_total()
    }

    async fn begin_reload(&self) {
        let mut snapshot = self.snapshot.lock().await;
        self.reloads.fetch_add(1, Ordering::SeqCst);
        snapshot.loading = true;
        snapshot.error = None;
    }

    /// Clears `loading` only when no other reload is still running.
    async fn finish_reload(&self) -> MutexGuard<'_, Snapshot> {
        let mut snapshot = self.snapshot.lock().await;
        if self.reloads.fetch_sub(1, Ordering::SeqCst) == 1 {
            snapshot.loading = false;
        }
        snapshot
    }

    async fn fetch(&self, username: &str) -> Result<(CategoryMap, Vec<Expense>)> {
        let user = self.client.user(username).await?;
        let listed = CategoryMap::from_names(user.into_category_names());
        let mut categories = listed.clone();
        let response = self.client.expenses(username).await?;
        let normalized = normalize(response.into_payload(), &mut categories);
        let unlisted = unlisted_categories(&listed, &normalized.found);
        if !unlisted.is_empty() {
            debug!(
                "Expenses arrived under unlisted categories: {}",
                unlisted.join(", ")
            );
        }
        Ok((categories, normalized.expenses))
    }

    /// Sends one mutation and reloads. A failed request is recorded and the data left alone.
    async fn mutate<F>(&self, request: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        if let Err(e) = request.await {
            Self::record(&mut *self.snapshot.lock().await, &e);
            return Err(e);
        }
        self.reload().await
    }

    /// Records `e` as the snapshot's error. An expired session also discards the data, since it
    /// belongs to a user who is no longer signed in.
    fn record(snapshot: &mut Snapshot, e: &anyhow::Error) {
        let unauthorized = e
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_unauthorized);
        if unauthorized {
            snapshot.categories = CategoryMap::default();
            snapshot.expenses.clear();
        }
        snapshot.error = Some(e.to_string());
    }

    async fn require_username(&self) -> Result<String> {
        match self.session().username().await {
            Some(username) => Ok(username),
            None => bail!("You are not signed in, please run 'expenses login' first"),
        }
    }
}

/// The names in `found` that `listed` does not know, in `found` order.
fn unlisted_categories<'a>(listed: &CategoryMap, found: &'a [String]) -> Vec<&'a str> {
    found
        .iter()
        .map(String::as_str)
        .filter(|name| !listed.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PayloadShape;
    use crate::session::SessionState;
    use crate::test::TestEnv;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_login_loads_and_normalizes() {
        let env = TestEnv::new().await;
        let tracker = env.tracker().await;
        tracker.login("demo", "demo").await.unwrap();

        let snapshot = tracker.snapshot().await;
        assert!(!snapshot.is_loading());
        assert_eq!(snapshot.error(), None);
        let names: Vec<&str> = snapshot.categories().iter().collect();
        assert_eq!(
            names,
            vec![
                "Groceries",
                "Coffee Shops",
                "Gas & Fuel",
                "Restaurants",
                "Utilities"
            ]
        );
        assert_eq!(snapshot.count_for_category("groceries"), 2);
        assert_eq!(tracker.total_for_category("Groceries").await, amount("150.64"));
        assert_eq!(tracker.grand_total().await, amount("374.46"));
    }

    #[tokio::test]
    async fn test_list_shape_gives_the_same_result() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let from_map = tracker.snapshot().await;

        env.backend().state().shape = PayloadShape::List;
        tracker.reload().await.unwrap();
        let from_list = tracker.snapshot().await;

        assert_eq!(from_map.expenses(), from_list.expenses());
        assert_eq!(from_map.categories(), from_list.categories());
    }

    #[tokio::test]
    async fn test_login_failure_is_reported() {
        let env = TestEnv::new().await;
        let tracker = env.tracker().await;
        let err = tracker.login("demo", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");
        assert_eq!(tracker.session().state().await, SessionState::Anonymous);
        assert!(tracker.login(" ", "demo").await.is_err());
    }

    #[tokio::test]
    async fn test_resume_stored_session() {
        let env = TestEnv::new().await;
        env.signed_in_tracker().await;

        let resumed = env.tracker().await;
        assert_eq!(resumed.session().state().await, SessionState::Authenticated);
        resumed.initialize_session().await.unwrap();
        assert_eq!(resumed.snapshot().await.expenses().len(), 7);
    }

    #[tokio::test]
    async fn test_add_category_reloads() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        tracker.add_category("  Travel ").await.unwrap();
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.categories().resolve("travel"), Some("Travel"));
        assert_eq!(snapshot.total_for_category("Travel"), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_category_records_error() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let before = tracker.snapshot().await;
        let err = tracker.add_category("groceries").await.unwrap_err();
        assert_eq!(err.to_string(), "Category already exists");
        let after = tracker.snapshot().await;
        assert_eq!(after.error(), Some("Category already exists"));
        assert_eq!(after.categories(), before.categories());
    }

    #[tokio::test]
    async fn test_delete_category_matches_case_insensitively() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        tracker.delete_category("COFFEE SHOPS").await.unwrap();
        let snapshot = tracker.snapshot().await;
        assert!(!snapshot.categories().contains("Coffee Shops"));
        assert_eq!(snapshot.count_for_category("coffee shops"), 0);
        let last = env.backend().state().requests.last().cloned().unwrap();
        assert_eq!(last.path(), crate::api::EXPENSES);
    }

    #[tokio::test]
    async fn test_add_expense_defaults_to_first_category() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        tracker
            .add_expense(&ExpenseDraft::new("12.50", "Farmers market"))
            .await
            .unwrap();
        let groceries = tracker.expenses_for_category("Groceries").await;
        assert_eq!(groceries.len(), 3);
        let added = groceries
            .iter()
            .find(|e| e.description() == "Farmers market")
            .unwrap();
        assert_eq!(added.category(), "Groceries");
        assert_eq!(added.amount(), amount("12.5"));
    }

    #[tokio::test]
    async fn test_invalid_expense_sends_nothing() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let sent = env.backend().state().requests.len();

        assert!(tracker
            .add_expense(&ExpenseDraft::new("-3", "Refund"))
            .await
            .is_err());
        assert!(tracker
            .add_expense(&ExpenseDraft::new("3", "  "))
            .await
            .is_err());
        assert!(tracker.add_category(" ").await.is_err());

        assert_eq!(env.backend().state().requests.len(), sent);
        assert_eq!(tracker.snapshot().await.error(), None);
    }

    #[tokio::test]
    async fn test_expense_needs_a_category_to_exist() {
        let env = TestEnv::new().await;
        env.backend().state().add_user("empty", "pw");
        let tracker = env.tracker().await;
        tracker.login("empty", "pw").await.unwrap();
        let err = tracker
            .add_expense(&ExpenseDraft::new("1", "Gum"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no categories"));
    }

    #[tokio::test]
    async fn test_delete_missing_expense_leaves_list_unchanged() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let before = tracker.snapshot().await;

        assert!(tracker.delete_expense("does-not-exist").await.is_err());

        let after = tracker.snapshot().await;
        assert_eq!(after.error(), Some("Expense not found"));
        assert_eq!(after.expenses(), before.expenses());
    }

    #[tokio::test]
    async fn test_delete_expense_updates_totals() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        tracker.delete_expense("1").await.unwrap();
        assert_eq!(
            tracker.total_for_category("groceries").await,
            amount("63.21")
        );
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_data() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let before = tracker.snapshot().await;

        env.backend().state().offline = true;
        assert!(tracker.reload().await.is_err());

        let after = tracker.snapshot().await;
        assert!(!after.is_loading());
        assert!(after.error().is_some());
        assert_eq!(after.expenses(), before.expenses());
    }

    #[tokio::test]
    async fn test_expired_session_redirects_once() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        env.backend().state().revoke_tokens();

        let (a, b) = tokio::join!(tracker.reload(), tracker.delete_expense("1"));
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(tracker.client().gate().redirect_count(), 1);
        assert_eq!(tracker.session().state().await, SessionState::Anonymous);
        assert!(tracker.snapshot().await.expenses().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mutations() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        let bagel = ExpenseDraft::new("4", "Bagel").category("restaurants");
        let (a, b) = tokio::join!(tracker.add_category("Travel"), tracker.add_expense(&bagel));
        a.unwrap();
        b.unwrap();
        tracker.reload().await.unwrap();
        let snapshot = tracker.snapshot().await;
        assert!(snapshot.categories().contains("travel"));
        assert_eq!(snapshot.count_for_category("Restaurants"), 2);
    }

    #[tokio::test]
    async fn test_malformed_expense_does_not_hide_the_rest() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        {
            let backend = env.backend();
            let mut state = backend.state();
            state.push_raw_expense("demo", "Groceries", serde_json::Value::Null);
            state.push_raw_expense("demo", "Groceries", serde_json::json!(-3));
        }

        tracker.reload().await.unwrap();
        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.error(), None);
        assert_eq!(snapshot.expenses().len(), 7);
        assert_eq!(tracker.grand_total().await, amount("374.46"));
    }

    #[tokio::test]
    async fn test_loading_holds_until_the_last_reload_finishes() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;

        tracker.begin_reload().await;
        tracker.reload().await.unwrap();
        assert!(tracker.snapshot().await.is_loading());

        drop(tracker.finish_reload().await);
        assert!(!tracker.snapshot().await.is_loading());
    }

    #[test]
    fn test_unlisted_categories_excludes_listed_ones() {
        let listed = CategoryMap::from_names(["Groceries", "Rent"]);
        let found = vec![
            "Groceries".to_string(),
            "Travel".to_string(),
            "rent".to_string(),
        ];
        assert_eq!(unlisted_categories(&listed, &found), vec!["Travel"]);
        assert!(unlisted_categories(&listed, &[]).is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let env = TestEnv::new().await;
        let tracker = env.signed_in_tracker().await;
        tracker.logout().await.unwrap();
        assert_eq!(tracker.session().state().await, SessionState::Anonymous);
        assert_eq!(tracker.snapshot().await, Snapshot::default());
        assert!(!env.config().session_path().exists());

        env.backend().state().offline = true;
        tracker.logout().await.unwrap();
    }
}
