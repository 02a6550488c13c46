//! Server-side session gate.
//!
//! Runs once per inbound request, in order: ensure a client-id cookie,
//! verify the access-token cookie, fall back to issuing a new access token
//! from the refresh-token cookie. The gate only ever attaches context and
//! cookies; it never rejects a request. Authorization is enforced per-route
//! by the [`CurrentUser`] and [`MaybeUser`] extractors.

mod context;
mod cookie;

pub use context::{CurrentUser, GateUser, MaybeUser, RequestContext};
pub use cookie::{CLIENT_ID_MAX_AGE_SECS, CookieConfig, get_cookie};

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::TokenIssuer;
use crate::jwt::{self, JwtVerifier};

/// State consumed by [`session_gate`].
pub struct GateState<I> {
    pub issuer: Arc<I>,
    pub verifier: Arc<JwtVerifier>,
    pub cookies: CookieConfig,
}

impl<I> Clone for GateState<I> {
    fn clone(&self) -> Self {
        Self {
            issuer: Arc::clone(&self.issuer),
            verifier: Arc::clone(&self.verifier),
            cookies: self.cookies.clone(),
        }
    }
}

/// Per-request middleware that establishes identity from cookies.
///
/// The request always continues downstream, authenticated or not; a failed
/// refresh logs the user out via cookie deletion but never aborts routing.
pub async fn session_gate<I: TokenIssuer>(
    State(state): State<GateState<I>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (context, cookies_out) = establish(&state, request.headers()).await;
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    for cookie in cookies_out {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

async fn establish<I: TokenIssuer>(
    state: &GateState<I>,
    headers: &HeaderMap,
) -> (RequestContext, Vec<String>) {
    let cookies = &state.cookies;
    let mut set_cookies = Vec::new();

    // 1. Client identity: minted once, independent of login state.
    let client_id = match get_cookie(headers, &cookies.client_id_name) {
        Some(id) => id.to_string(),
        None => {
            let id = Uuid::new_v4().to_string();
            set_cookies.push(cookies.set(&cookies.client_id_name, &id, Some(CLIENT_ID_MAX_AGE_SECS)));
            id
        }
    };

    let mut context = RequestContext {
        client_id,
        access_token: None,
        user: None,
    };

    // 2. Access token from cookie, verified before it is trusted.
    let mut drop_access_cookie = false;
    if let Some(token) = get_cookie(headers, &cookies.access_name) {
        match state.verifier.verify(token) {
            Ok(claims) => {
                context.user = Some(GateUser {
                    id: claims.sub,
                    role: claims.role,
                });
                context.access_token = Some(token.to_string());
                return (context, set_cookies);
            }
            Err(e) => {
                // Expired or tampered: forget the cookie and fall through
                // to the refresh path.
                debug!(error = %e, "Access token cookie rejected");
                drop_access_cookie = true;
            }
        }
    }

    // 3. Refresh fallback.
    let Some(refresh_token) = get_cookie(headers, &cookies.refresh_name) else {
        if drop_access_cookie {
            set_cookies.push(cookies.clear(&cookies.access_name));
        }
        return (context, set_cookies);
    };

    match state.issuer.issue_access_token(refresh_token).await {
        Ok(issued) => match state.verifier.verify(&issued.access_token) {
            Ok(claims) => {
                let now = jwt::unix_now();
                set_cookies.push(cookies.set(
                    &cookies.access_name,
                    &issued.access_token,
                    Some(issued.expires_at.saturating_sub(now)),
                ));
                // A rotated refresh token replaces its cookie in the same
                // response as the new access token.
                if let Some(rotated) = &issued.rotated_refresh {
                    set_cookies.push(cookies.set(
                        &cookies.refresh_name,
                        &rotated.token,
                        rotated.expires_at.map(|exp| exp.saturating_sub(now)),
                    ));
                }
                context.user = Some(GateUser {
                    id: claims.sub,
                    role: claims.role,
                });
                context.access_token = Some(issued.access_token);
            }
            Err(e) => {
                warn!(error = %e, "Backend issued an unverifiable access token");
                set_cookies.push(cookies.clear(&cookies.access_name));
                set_cookies.push(cookies.clear(&cookies.refresh_name));
            }
        },
        Err(e) => {
            debug!(error = %e, "Refresh-token issuance failed, continuing unauthenticated");
            set_cookies.push(cookies.clear(&cookies.access_name));
            set_cookies.push(cookies.clear(&cookies.refresh_name));
        }
    }

    (context, set_cookies)
}
