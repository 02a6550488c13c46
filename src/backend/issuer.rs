//! Access-token issuance against the auth backend.
//!
//! The backend rotates the refresh token on every issuance; the wire type
//! tolerates responses without rotation fields, in which case the previous
//! refresh token stays in use.

use chrono::DateTime;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;

use super::graphql::{GraphqlClient, GraphqlError};

/// GraphQL mutation consumed from the auth backend.
const ISSUE_ACCESS_TOKEN: &str = r#"
mutation IssueAccessToken($refreshToken: String!) {
    issueAccessToken(refreshToken: $refreshToken) {
        accessToken
        expiresAt
        refreshToken
        refreshExpiresAt
    }
}
"#;

/// A newly issued access token, with the rotated refresh token when the
/// backend returned one.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    /// Unix seconds.
    pub expires_at: u64,
    pub rotated_refresh: Option<RotatedRefresh>,
}

/// Replacement refresh token delivered alongside a new access token.
#[derive(Debug, Clone)]
pub struct RotatedRefresh {
    pub token: String,
    /// Unix seconds, when the backend reported one.
    pub expires_at: Option<u64>,
}

/// Errors from a token issuance attempt.
#[derive(Debug, Clone)]
pub enum IssueError {
    /// The backend rejected the refresh token or could not be reached.
    Backend(String),
    /// The response parsed but is missing or mangling required fields.
    MalformedResponse(String),
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::Backend(e) => write!(f, "Token issuance failed: {}", e),
            IssueError::MalformedResponse(e) => {
                write!(f, "Malformed token issuance response: {}", e)
            }
        }
    }
}

impl std::error::Error for IssueError {}

/// Source of fresh access tokens in exchange for a refresh token.
pub trait TokenIssuer: Send + Sync {
    fn issue_access_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<IssuedToken, IssueError>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueAccessTokenData {
    issue_access_token: IssuedTokenWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedTokenWire {
    access_token: String,
    expires_at: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh_expires_at: Option<String>,
}

/// Convert the backend's ISO8601 expiry to Unix seconds. This is the only
/// place wire timestamps are interpreted; everything downstream uses
/// seconds.
fn parse_expiry(value: &str) -> Result<u64, IssueError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| IssueError::MalformedResponse(format!("bad expiresAt {:?}: {}", value, e)))?;
    u64::try_from(parsed.timestamp()).map_err(|_| {
        IssueError::MalformedResponse(format!("expiresAt {:?} is before the epoch", value))
    })
}

/// [`TokenIssuer`] backed by the auth backend's GraphQL endpoint.
#[derive(Clone)]
pub struct GraphqlTokenIssuer {
    client: GraphqlClient,
}

impl GraphqlTokenIssuer {
    pub fn new(client: GraphqlClient) -> Self {
        Self { client }
    }
}

impl TokenIssuer for GraphqlTokenIssuer {
    async fn issue_access_token(&self, refresh_token: &str) -> Result<IssuedToken, IssueError> {
        let data: IssueAccessTokenData = self
            .client
            .execute(ISSUE_ACCESS_TOKEN, json!({ "refreshToken": refresh_token }))
            .await
            .map_err(|e| match e {
                GraphqlError::InvalidResponse(msg) => IssueError::MalformedResponse(msg),
                other => IssueError::Backend(other.to_string()),
            })?;

        let wire = data.issue_access_token;
        let expires_at = parse_expiry(&wire.expires_at)?;
        let rotated_refresh = wire
            .refresh_token
            .map(|token| -> Result<RotatedRefresh, IssueError> {
                let expires_at = wire
                    .refresh_expires_at
                    .as_deref()
                    .map(parse_expiry)
                    .transpose()?;
                Ok(RotatedRefresh { token, expires_at })
            })
            .transpose()?;

        Ok(IssuedToken {
            access_token: wire.access_token,
            expires_at,
            rotated_refresh,
        })
    }
}
