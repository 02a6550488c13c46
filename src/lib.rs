pub mod api;
pub mod backend;
pub mod cli;
pub mod gate;
pub mod jwt;
pub mod session;

use std::sync::Arc;

use api::AuthState;
use axum::{Router, middleware};
use backend::TokenIssuer;
use gate::{CookieConfig, GateState, session_gate};
use jwt::JwtVerifier;
use tokio::net::TcpListener;

/// Server configuration assembled by the CLI (or by tests).
pub struct ServerConfig<I> {
    /// Issues access tokens from refresh tokens (the auth backend seam).
    pub issuer: Arc<I>,
    /// Secret for verifying access-token signatures.
    pub jwt_secret: Vec<u8>,
    /// Expected `iss` claim, when the backend sets one.
    pub jwt_issuer: Option<String>,
    /// Expected `aud` claim, when the backend sets one.
    pub jwt_audience: Option<String>,
    /// Cookie names and the Secure flag.
    pub cookies: CookieConfig,
}

/// Build the application router: the auth API plus the embedding app's
/// routes, all behind the session gate.
pub fn create_app<I: TokenIssuer + 'static>(config: &ServerConfig<I>, app_routes: Router) -> Router {
    let verifier = Arc::new(JwtVerifier::new(
        &config.jwt_secret,
        config.jwt_issuer.as_deref(),
        config.jwt_audience.as_deref(),
    ));

    let auth_state = AuthState {
        issuer: Arc::clone(&config.issuer),
        verifier: Arc::clone(&verifier),
        cookies: config.cookies.clone(),
    };
    let gate_state = GateState {
        issuer: Arc::clone(&config.issuer),
        verifier,
        cookies: config.cookies.clone(),
    };

    app_routes
        .nest("/api", api::create_api_router(auth_state))
        .layer(middleware::from_fn_with_state(gate_state, session_gate::<I>))
}

/// Run the server on the given listener. This function blocks until the
/// server exits.
pub async fn run_server<I: TokenIssuer + 'static>(
    config: ServerConfig<I>,
    app_routes: Router,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config, app_routes);
    axum::serve(listener, app).await
}
