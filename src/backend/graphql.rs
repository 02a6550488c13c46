//! Minimal GraphQL-over-HTTP transport for the auth backend.
//!
//! Responses are parsed into typed envelopes; handlers never index into
//! untyped JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Network timeout for backend calls. A timed-out call is reported as a
/// transport failure like any other.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a GraphQL call.
#[derive(Debug)]
pub enum GraphqlError {
    /// Transport-level failure (connect, timeout, TLS)
    Transport(String),
    /// Non-2xx HTTP status without a usable GraphQL error
    Status(u16),
    /// Body was not a GraphQL response envelope, or `data` was absent
    InvalidResponse(String),
    /// The server returned GraphQL errors
    Server(Vec<String>),
}

impl std::fmt::Display for GraphqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphqlError::Transport(e) => write!(f, "GraphQL request failed: {}", e),
            GraphqlError::Status(code) => write!(f, "GraphQL endpoint returned HTTP {}", code),
            GraphqlError::InvalidResponse(e) => write!(f, "Invalid GraphQL response: {}", e),
            GraphqlError::Server(messages) => {
                write!(f, "GraphQL errors: {}", messages.join(", "))
            }
        }
    }
}

impl std::error::Error for GraphqlError {}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Deserialize)]
struct ServerError {
    message: String,
}

/// GraphQL client bound to a single endpoint URL.
#[derive(Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Execute a query without authentication.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GraphqlError> {
        self.request(query, variables, None).await
    }

    /// Execute a query with a bearer token attached.
    pub async fn execute_bearer<T: DeserializeOwned>(
        &self,
        token: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, GraphqlError> {
        self.request(query, variables, Some(token)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        bearer: Option<&str>,
    ) -> Result<T, GraphqlError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&GraphqlRequest { query, variables });
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GraphqlError::Transport(e.to_string()))?;
        let status = response.status();

        let body: GraphqlResponse<T> = response
            .json()
            .await
            .map_err(|e| GraphqlError::InvalidResponse(e.to_string()))?;

        // GraphQL-level errors take precedence over the HTTP status; servers
        // commonly report both.
        if !body.errors.is_empty() {
            return Err(GraphqlError::Server(
                body.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        if !status.is_success() {
            return Err(GraphqlError::Status(status.as_u16()));
        }

        body.data
            .ok_or_else(|| GraphqlError::InvalidResponse("response has no data".to_string()))
    }
}
