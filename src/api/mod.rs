mod error;
mod tokens;

use axum::Router;

pub use error::ApiError;
pub use tokens::AuthState;

use crate::backend::TokenIssuer;

/// Create the API router.
pub fn create_api_router<I: TokenIssuer + 'static>(state: AuthState<I>) -> Router {
    Router::new().nest("/auth", tokens::router(state))
}
