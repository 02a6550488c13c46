//! In-memory session snapshot with reactive subscribers.

use tokio::sync::watch;

use crate::jwt::Claims;

/// A fully-established session. Token and decoded claims always travel
/// together; there is no way to hold one without the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub access_token: String,
    pub claims: Claims,
}

/// Snapshot of the current session: either fully valid or fully empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    authenticated: Option<Authenticated>,
}

impl Session {
    pub fn authenticated(&self) -> Option<&Authenticated> {
        self.authenticated.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.authenticated.as_ref().map(|a| a.access_token.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.authenticated.is_none()
    }

    /// Token present and not yet expired.
    pub fn is_valid(&self, now: u64) -> bool {
        self.authenticated
            .as_ref()
            .is_some_and(|a| a.claims.exp > now)
    }

    /// Invalid, or expiring within `threshold` seconds (boundary inclusive).
    pub fn needs_refresh(&self, now: u64, threshold: u64) -> bool {
        match &self.authenticated {
            Some(a) if a.claims.exp > now => a.claims.exp - now <= threshold,
            _ => true,
        }
    }
}

/// Shared, observable session state. Clones share the same underlying
/// store, so a coordinator and any number of readers stay in sync.
#[derive(Clone)]
pub struct SessionState {
    tx: watch::Sender<Session>,
}

impl SessionState {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(Session::default()),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Replace the session wholesale and notify subscribers.
    pub fn set(&self, access_token: String, claims: Claims) {
        self.tx.send_replace(Session {
            authenticated: Some(Authenticated {
                access_token,
                claims,
            }),
        });
    }

    /// Drop the session. Idempotent; subscribers are only woken when
    /// something actually changed.
    pub fn clear(&self) {
        self.tx.send_if_modified(|session| {
            if session.authenticated.is_some() {
                session.authenticated = None;
                true
            } else {
                false
            }
        });
    }

    /// Watch for session transitions.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub fn is_valid(&self, now: u64) -> bool {
        self.tx.borrow().is_valid(now)
    }

    pub fn needs_refresh(&self, now: u64, threshold: u64) -> bool {
        self.tx.borrow().needs_refresh(now, threshold)
    }

    /// Token usable at `now` and not within the refresh threshold.
    pub(crate) fn fresh_token(&self, now: u64, threshold: u64) -> Option<String> {
        let session = self.tx.borrow();
        if session.needs_refresh(now, threshold) {
            None
        } else {
            session.access_token().map(str::to_string)
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
