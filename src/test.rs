//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{Mode, TestBackend, TEST_PASSWORD, TEST_USERNAME};
use crate::tracker::ExpenseTracker;
use crate::Config;
use tempfile::TempDir;
use uuid::Uuid;

/// Test environment that sets up an expenses home directory with a Config whose base URL is
/// unique, so that it gets its own seeded `TestBackend`.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("expenses");
        let rand = Uuid::new_v4().to_string().replace('-', "");
        let base_url = format!("http://{rand}.test/api");
        let config = Config::create(&root, &base_url).await.unwrap();

        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// The in-memory backend that `Mode::Test` uses for this environment.
    pub fn backend(&self) -> TestBackend {
        TestBackend::shared(self.config.base_url().as_str())
    }

    /// A tracker using the stored session, if any. Its data is not loaded yet.
    pub async fn tracker(&self) -> ExpenseTracker {
        ExpenseTracker::open(&self.config, Mode::Test).await.unwrap()
    }

    /// A tracker signed in as the seeded user with its data loaded.
    pub async fn signed_in_tracker(&self) -> ExpenseTracker {
        let tracker = self.tracker().await;
        tracker.login(TEST_USERNAME, TEST_PASSWORD).await.unwrap();
        tracker
    }
}
