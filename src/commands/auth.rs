//! Session command handlers:
//! - `expenses login` - sign in and store the session
//! - `expenses logout` - sign out and delete the stored session
//! - `expenses status` - report the stored session

use crate::api::Mode;
use crate::args::LoginArgs;
use crate::commands::Out;
use crate::session::{SessionState, SessionStore};
use crate::tracker::ExpenseTracker;
use crate::{Config, Result};
use serde::Serialize;

/// Who is signed in, and to which service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub state: SessionState,
    pub username: Option<String>,
    pub base_url: String,
}

impl SessionReport {
    async fn new(config: &Config, session: &SessionStore) -> Self {
        Self {
            state: session.state().await,
            username: session.username().await,
            base_url: config.base_url().to_string(),
        }
    }
}

/// Signs in, stores the session under `$EXPENSES_HOME/.secrets` and loads the user's data.
pub async fn login(config: &Config, mode: Mode, args: &LoginArgs) -> Result<Out<SessionReport>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    tracker.login(args.username(), args.password()).await?;
    let snapshot = tracker.snapshot().await;
    let report = SessionReport::new(config, tracker.session()).await;
    Ok(Out::new(
        format!(
            "Signed in as {} ({} categories, {} expenses)",
            args.username().trim(),
            snapshot.categories().len(),
            snapshot.expenses().len()
        ),
        report,
    ))
}

/// Signs out. Succeeds even when the service cannot be reached.
pub async fn logout(config: &Config, mode: Mode) -> Result<Out<()>> {
    let tracker = ExpenseTracker::open(config, mode).await?;
    let username = tracker.session().username().await;
    tracker.logout().await?;
    Ok(match username {
        Some(username) => format!("Signed out {username}").into(),
        None => "You were not signed in".into(),
    })
}

/// Reports the stored session without contacting the service.
pub async fn status(config: &Config) -> Result<Out<SessionReport>> {
    let session = SessionStore::load(config.session_path()).await;
    let report = SessionReport::new(config, &session).await;
    let message = match &report.username {
        Some(username) => format!("Signed in to {} as {username}", report.base_url),
        None => format!(
            "Not signed in to {}, run 'expenses login' to sign in",
            report.base_url
        ),
    };
    Ok(Out::new(message, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_login_status_logout() {
        let env = TestEnv::new().await;
        let config = env.config();

        let out = login(&config, Mode::Test, &LoginArgs::new("demo", "demo"))
            .await
            .unwrap();
        assert_eq!(
            out.message(),
            "Signed in as demo (5 categories, 7 expenses)"
        );

        let out = status(&config).await.unwrap();
        let report = out.structure().unwrap();
        assert_eq!(report.state, SessionState::Authenticated);
        assert_eq!(report.username.as_deref(), Some("demo"));

        let out = logout(&config, Mode::Test).await.unwrap();
        assert_eq!(out.message(), "Signed out demo");
        let out = status(&config).await.unwrap();
        assert_eq!(out.structure().unwrap().state, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let env = TestEnv::new().await;
        let err = login(&env.config(), Mode::Test, &LoginArgs::new("demo", "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");
        assert!(!env.config().session_path().exists());
    }

    #[tokio::test]
    async fn test_logout_when_signed_out() {
        let env = TestEnv::new().await;
        let out = logout(&env.config(), Mode::Test).await.unwrap();
        assert_eq!(out.message(), "You were not signed in");
    }
}
