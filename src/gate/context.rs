//! Per-request identity context and the extractors that read it.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::api::ApiError;

/// Identity attached to a request by the session gate. Advisory context:
/// handlers decide per-route whether an unauthenticated request is
/// acceptable. Discarded with the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Stable anonymous id, present on every request regardless of login
    /// state.
    pub client_id: String,
    /// Verified bearer token, when one was established.
    pub access_token: Option<String>,
    pub user: Option<GateUser>,
}

/// The authenticated principal, from verified access-token claims.
#[derive(Debug, Clone)]
pub struct GateUser {
    pub id: String,
    pub role: Option<String>,
}

/// Extractor for handlers that require an authenticated user.
/// Rejects with 401 when the gate established no user.
pub struct CurrentUser(pub GateUser);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user.clone())
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

/// Optional authentication extractor - never fails.
/// For endpoints that work both authenticated and unauthenticated.
pub struct MaybeUser(pub Option<GateUser>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<RequestContext>()
                .and_then(|ctx| ctx.user.clone()),
        ))
    }
}
