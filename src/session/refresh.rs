//! Single-flight access-token refresh.
//!
//! Concurrent callers that find the session stale all await the same
//! in-flight backend call and observe its single outcome. Sharing the
//! in-flight future (rather than guarding with a boolean) makes the
//! check-then-act race structurally impossible, and keeps a losing
//! concurrent caller from burning a rotated refresh token.

use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, warn};

use crate::backend::TokenIssuer;
use crate::jwt;
use crate::session::SessionState;

/// Refresh proactively when the token expires within this window, so an
/// outbound call cannot race hard expiry mid-flight.
pub const REFRESH_THRESHOLD_SECS: u64 = 5 * 60;

/// Terminal outcome of a refresh attempt. Both variants mean the session
/// has been cleared and only a new login can recover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token is available; no network call was attempted.
    RefreshTokenMissing,
    /// The refresh attempt failed (network, backend rejection, or a
    /// malformed response).
    RefreshFailed(String),
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::RefreshTokenMissing => write!(f, "No refresh token available"),
            RefreshError::RefreshFailed(e) => write!(f, "Session refresh failed: {}", e),
        }
    }
}

impl std::error::Error for RefreshError {}

type SharedAttempt = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Serializes refreshes of a shared [`SessionState`].
///
/// The refresh token never leaves this coordinator: it is not part of
/// [`SessionState`] and is invisible to subscribers.
pub struct RefreshCoordinator<I> {
    inner: Arc<Inner<I>>,
}

impl<I> Clone for RefreshCoordinator<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<I> {
    issuer: I,
    session: SessionState,
    threshold: u64,
    refresh_token: Mutex<Option<String>>,
    in_flight: Mutex<Option<SharedAttempt>>,
}

impl<I: TokenIssuer + 'static> RefreshCoordinator<I> {
    pub fn new(issuer: I, session: SessionState, refresh_token: Option<String>) -> Self {
        Self::with_threshold(issuer, session, refresh_token, REFRESH_THRESHOLD_SECS)
    }

    pub fn with_threshold(
        issuer: I,
        session: SessionState,
        refresh_token: Option<String>,
        threshold: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                issuer,
                session,
                threshold,
                refresh_token: Mutex::new(refresh_token),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// The session this coordinator transitions.
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    /// Replace the held refresh token (e.g. after a fresh login).
    pub fn set_refresh_token(&self, token: Option<String>) {
        *self.inner.refresh_token.lock().unwrap() = token;
    }

    /// Ensure a usable access token, refreshing at most once across all
    /// concurrent callers. Returns the token to attach to outbound calls.
    pub async fn ensure_valid(&self, now: u64) -> Result<String, RefreshError> {
        if let Some(token) = self.inner.session.fresh_token(now, self.inner.threshold) {
            return Ok(token);
        }

        let attempt = {
            let mut slot = self.inner.in_flight.lock().unwrap();
            match slot.as_ref() {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = Self::run_refresh(Arc::clone(&self.inner)).boxed().shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };
        attempt.await
    }

    async fn run_refresh(inner: Arc<Inner<I>>) -> Result<String, RefreshError> {
        let result = Self::refresh_once(&inner).await;
        if let Err(e) = &result {
            // Any failure is unrecoverable for this session: a partially
            // failed refresh cannot be assumed valid.
            inner.session.clear();
            warn!(error = %e, "Session refresh failed");
        }
        *inner.in_flight.lock().unwrap() = None;
        result
    }

    async fn refresh_once(inner: &Inner<I>) -> Result<String, RefreshError> {
        let refresh_token = inner
            .refresh_token
            .lock()
            .unwrap()
            .clone()
            .ok_or(RefreshError::RefreshTokenMissing)?;

        let issued = inner
            .issuer
            .issue_access_token(&refresh_token)
            .await
            .map_err(|e| RefreshError::RefreshFailed(e.to_string()))?;

        let claims = jwt::decode_unverified(&issued.access_token).map_err(|_| {
            RefreshError::RefreshFailed("backend returned an undecodable access token".to_string())
        })?;

        // The rotated refresh token and the new session swap in under one
        // lock, so no caller can observe one without the other.
        {
            let mut slot = inner.refresh_token.lock().unwrap();
            if let Some(rotated) = &issued.rotated_refresh {
                *slot = Some(rotated.token.clone());
            }
            inner.session.set(issued.access_token.clone(), claims);
        }

        debug!("Access token refreshed");
        Ok(issued.access_token)
    }
}
