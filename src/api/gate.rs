use crate::api::{LOGIN, LOGOUT, REGISTER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Paths whose authorization failures are ordinary errors (a wrong password, say) rather than a
/// sign that the session has expired.
const BYPASS: &[&str] = &[LOGIN, REGISTER, LOGOUT];

/// True if an authorization failure from `path` should not end the session.
pub fn bypasses_gate(path: &str) -> bool {
    BYPASS.iter().any(|p| path.contains(p))
}

/// Makes sure that a burst of authorization failures sends the user back to login only once.
///
/// The first failure redirects and starts a cool-down; failures during the cool-down are
/// suppressed. Once it has elapsed the next failure redirects again.
#[derive(Debug)]
pub struct AuthGate {
    cooldown: Duration,
    last_redirect: Mutex<Option<Instant>>,
    redirects: AtomicUsize,
}

impl AuthGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_redirect: Mutex::new(None),
            redirects: AtomicUsize::new(0),
        }
    }

    /// Records an authorization failure. Returns true when this failure should redirect.
    pub fn on_authorization_failure(&self) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_redirect
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(at) if now.duration_since(at) < self.cooldown => false,
            _ => {
                *last = Some(now);
                self.redirects.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    /// How many redirects this gate has triggered.
    pub fn redirect_count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}
