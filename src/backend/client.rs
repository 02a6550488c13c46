//! Outbound GraphQL calls that carry session credentials.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::graphql::{GraphqlClient, GraphqlError};
use super::issuer::TokenIssuer;
use crate::jwt;
use crate::session::RefreshCoordinator;

/// Errors from a session-authenticated backend call.
#[derive(Debug)]
pub enum ClientError {
    /// No valid session could be established; no downstream call was made.
    /// The caller should start a login flow, never swallow this.
    Unauthorized,
    /// The downstream call itself failed.
    Request(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Unauthorized => write!(f, "Not authenticated"),
            ClientError::Request(e) => write!(f, "Backend request failed: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

fn map_request_error(e: GraphqlError) -> ClientError {
    match e {
        GraphqlError::Status(401) => ClientError::Unauthorized,
        other => ClientError::Request(other.to_string()),
    }
}

/// GraphQL client that attaches the current session's bearer token,
/// refreshing it first when needed.
pub struct AuthenticatedClient<I> {
    graphql: GraphqlClient,
    coordinator: RefreshCoordinator<I>,
}

impl<I: TokenIssuer + 'static> AuthenticatedClient<I> {
    pub fn new(graphql: GraphqlClient, coordinator: RefreshCoordinator<I>) -> Self {
        Self {
            graphql,
            coordinator,
        }
    }

    /// Execute a query with the ambient session token. Ensures the token is
    /// valid first; a failed refresh surfaces as [`ClientError::Unauthorized`]
    /// without any downstream call.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ClientError> {
        let token = self
            .coordinator
            .ensure_valid(jwt::unix_now())
            .await
            .map_err(|_| ClientError::Unauthorized)?;
        self.graphql
            .execute_bearer(&token, query, variables)
            .await
            .map_err(map_request_error)
    }

    /// Execute a query with an explicitly supplied token, bypassing the
    /// ambient session. For server-context calls where the token comes from
    /// a just-verified request rather than shared state.
    pub async fn execute_with_token<T: DeserializeOwned>(
        &self,
        token: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, ClientError> {
        self.graphql
            .execute_bearer(token, query, variables)
            .await
            .map_err(map_request_error)
    }
}
