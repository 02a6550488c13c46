//! Session token endpoints.
//!
//! - POST `/token/access` - Exchange the refresh-token cookie for a new access token
//! - POST `/logout` - Clear session cookies
//! - GET `/session` - Probe the gate-established session

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::debug;

use super::error::ApiError;
use crate::backend::TokenIssuer;
use crate::gate::{CookieConfig, CurrentUser, RequestContext, get_cookie};
use crate::jwt::{self, JwtVerifier};

pub struct AuthState<I> {
    pub issuer: Arc<I>,
    pub verifier: Arc<JwtVerifier>,
    pub cookies: CookieConfig,
}

impl<I> Clone for AuthState<I> {
    fn clone(&self) -> Self {
        Self {
            issuer: Arc::clone(&self.issuer),
            verifier: Arc::clone(&self.verifier),
            cookies: self.cookies.clone(),
        }
    }
}

pub fn router<I: TokenIssuer + 'static>(state: AuthState<I>) -> Router {
    Router::new()
        .route("/token/access", post(issue_access_token::<I>))
        .route("/logout", post(logout::<I>))
        .route("/session", get(session_probe))
        .with_state(state)
}

#[derive(Serialize)]
struct AccessTokenResponse {
    access_token: String,
    /// Unix seconds.
    expires_at: u64,
}

/// Issue a fresh access token from the refresh-token cookie.
///
/// When the session gate already established a verified token for this
/// request, that token is returned as-is: the gate's issuance consumed the
/// inbound refresh token, and issuing again here would race its rotation.
/// Returns 401 with cleared cookies when no usable refresh token exists.
async fn issue_access_token<I: TokenIssuer>(
    State(state): State<AuthState<I>>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, _body) = request.into_parts();

    if let Some(token) = parts
        .extensions
        .get::<RequestContext>()
        .and_then(|ctx| ctx.access_token.clone())
    {
        let claims = jwt::decode_unverified(&token)
            .map_err(|e| ApiError::backend_error("Gate-established token undecodable", e))?;
        return Ok((
            StatusCode::OK,
            Json(AccessTokenResponse {
                access_token: token,
                expires_at: claims.exp,
            }),
        )
            .into_response());
    }

    let Some(refresh_token) = get_cookie(&parts.headers, &state.cookies.refresh_name) else {
        return Err(ApiError::unauthorized("No refresh token"));
    };

    let issued = match state.issuer.issue_access_token(refresh_token).await {
        Ok(issued) => issued,
        Err(e) => {
            debug!(error = %e, "Access token issuance failed");
            return Ok(logged_out_response(&state.cookies));
        }
    };

    // Same trust rule as the gate: never hand out a token this server
    // cannot verify.
    if let Err(e) = state.verifier.verify(&issued.access_token) {
        debug!(error = %e, "Backend issued an unverifiable access token");
        return Ok(logged_out_response(&state.cookies));
    }

    let now = jwt::unix_now();
    let mut response = (
        StatusCode::OK,
        Json(AccessTokenResponse {
            access_token: issued.access_token.clone(),
            expires_at: issued.expires_at,
        }),
    )
        .into_response();

    let mut cookies_out = vec![state.cookies.set(
        &state.cookies.access_name,
        &issued.access_token,
        Some(issued.expires_at.saturating_sub(now)),
    )];
    if let Some(rotated) = &issued.rotated_refresh {
        cookies_out.push(state.cookies.set(
            &state.cookies.refresh_name,
            &rotated.token,
            rotated.expires_at.map(|exp| exp.saturating_sub(now)),
        ));
    }
    for cookie in cookies_out {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// 401 with both auth cookies cleared: the refresh token is spent or
/// invalid, only a new login can help.
fn logged_out_response(cookies: &CookieConfig) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Invalid or expired refresh token" })),
    )
        .into_response();
    for cookie in [
        cookies.clear(&cookies.access_name),
        cookies.clear(&cookies.refresh_name),
    ] {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Logout - clear both auth cookies. Succeeds even when no cookies were
/// present.
async fn logout<I: TokenIssuer>(State(state): State<AuthState<I>>) -> impl IntoResponse {
    let clear_access = state.cookies.clear(&state.cookies.access_name);
    let clear_refresh = state.cookies.clear(&state.cookies.refresh_name);

    (
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Json(serde_json::json!({ "success": true })),
    )
}

#[derive(Serialize)]
struct SessionResponse {
    user: SessionUser,
}

#[derive(Serialize)]
struct SessionUser {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

/// Report the session the gate established for this request.
/// Returns 200 with the user, 401 when unauthenticated. A lightweight
/// probe for clients re-checking auth status (e.g. on bfcache restore).
async fn session_probe(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(SessionResponse {
            user: SessionUser {
                id: user.id,
                role: user.role,
            },
        }),
    )
}
