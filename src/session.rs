//! The authenticated session: a username and the bearer token the service issued for it.
//!
//! The session is persisted to `$EXPENSES_HOME/.secrets/session.json` so that it survives between
//! invocations, and is torn down on logout or on any authorization failure.

use crate::{utils, Result};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A username together with its bearer token. Only valid while both are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    username: String,
    token: String,
}

impl Session {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let session = Self {
            username: username.into(),
            token: token.into(),
        };
        if !session.is_valid() {
            bail!("A session needs both a username and a token");
        }
        Ok(session)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn is_valid(&self) -> bool {
        !self.username.trim().is_empty() && !self.token.trim().is_empty()
    }
}

/// Whether a session is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
}

serde_plain::derive_display_from_serialize!(SessionState);

/// A shared handle to the session. Clones refer to the same session, so the API client and the
/// tracker observe each other's changes.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    current: Arc<Mutex<Option<Session>>>,
}

impl SessionStore {
    /// Reads the persisted session at `path`. A missing, unreadable or incomplete file starts the
    /// store in the anonymous state.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = if path.is_file() {
            match utils::deserialize::<Session>(&path).await {
                Ok(session) if session.is_valid() => Some(session),
                Ok(_) => {
                    warn!("Ignoring incomplete session file {}", path.display());
                    None
                }
                Err(e) => {
                    warn!("Ignoring unreadable session file: {e:#}");
                    None
                }
            }
        } else {
            None
        };
        debug!(
            "Session store loaded from {} ({})",
            path.display(),
            if session.is_some() {
                SessionState::Authenticated
            } else {
                SessionState::Anonymous
            }
        );
        Self {
            path,
            current: Arc::new(Mutex::new(session)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves to the authenticated state and persists the session.
    pub async fn establish(&self, session: Session) -> Result<()> {
        utils::save_private(&self.path, &session).await?;
        *self.current.lock().await = Some(session);
        Ok(())
    }

    /// Moves to the anonymous state and deletes the persisted session. Returns whether a session
    /// was held.
    pub async fn teardown(&self) -> Result<bool> {
        let had_session = self.current.lock().await.take().is_some();
        utils::remove(&self.path).await?;
        Ok(had_session)
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.lock().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|s| s.token().to_string())
    }

    pub async fn username(&self) -> Option<String> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|s| s.username().to_string())
    }

    pub async fn state(&self) -> SessionState {
        match *self.current.lock().await {
            Some(_) => SessionState::Authenticated,
            None => SessionState::Anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_establish_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let store = SessionStore::load(&path).await;
        assert_eq!(store.state().await, SessionState::Anonymous);

        store
            .establish(Session::new("alice", "tok-1").unwrap())
            .await
            .unwrap();
        assert_eq!(store.state().await, SessionState::Authenticated);
        assert_eq!(store.token().await.as_deref(), Some("tok-1"));

        let reloaded = SessionStore::load(&path).await;
        assert_eq!(reloaded.username().await.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_teardown_clears_memory_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::load(&path).await;
        let other_handle = store.clone();
        store
            .establish(Session::new("alice", "tok-1").unwrap())
            .await
            .unwrap();

        assert!(other_handle.teardown().await.unwrap());
        assert_eq!(store.state().await, SessionState::Anonymous);
        assert!(!path.exists());
        assert!(!store.teardown().await.unwrap());
    }

    #[tokio::test]
    async fn test_incomplete_or_corrupt_file_is_anonymous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        utils::write(&path, r#"{"username": "alice", "token": ""}"#)
            .await
            .unwrap();
        assert_eq!(
            SessionStore::load(&path).await.state().await,
            SessionState::Anonymous
        );

        utils::write(&path, "not json").await.unwrap();
        assert_eq!(
            SessionStore::load(&path).await.state().await,
            SessionState::Anonymous
        );
    }

    #[test]
    fn test_session_requires_both_parts() {
        assert!(Session::new("", "tok").is_err());
        assert!(Session::new("alice", " ").is_err());
        assert!(Session::new("alice", "tok").is_ok());
    }
}
