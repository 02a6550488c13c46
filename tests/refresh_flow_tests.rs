//! End-to-end refresh flows against an in-process fake of the GraphQL auth
//! backend, exercising the real wire path: reqwest -> axum -> JSON envelope.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, routing::post};
use common::{TEST_SECRET, mint_token};
use serde_json::{Value, json};
use tokengate::backend::{AuthenticatedClient, ClientError, GraphqlClient, GraphqlTokenIssuer};
use tokengate::jwt::{Claims, unix_now};
use tokengate::session::{RefreshCoordinator, SessionState};

/// Refresh tokens the fake backend accepts. Every issuance rotates to
/// `rotated-refresh`.
const GOOD_REFRESH_TOKENS: [&str; 2] = ["good-refresh", "rotated-refresh"];

struct FakeBackend {
    issue_calls: AtomicUsize,
    data_calls: AtomicUsize,
}

async fn graphql_handler(
    state: Arc<FakeBackend>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default();

    if query.contains("IssueAccessToken") {
        state.issue_calls.fetch_add(1, Ordering::SeqCst);
        let refresh_token = body["variables"]["refreshToken"].as_str().unwrap_or_default();
        if !GOOD_REFRESH_TOKENS.contains(&refresh_token) {
            return Json(json!({
                "errors": [{ "message": "invalid refresh token" }]
            }));
        }

        let expires_at = unix_now() + 3_600;
        let expires_at_iso = chrono::DateTime::from_timestamp(expires_at as i64, 0)
            .unwrap()
            .to_rfc3339();
        let refresh_expires_iso = chrono::DateTime::from_timestamp((expires_at + 86_400) as i64, 0)
            .unwrap()
            .to_rfc3339();
        return Json(json!({
            "data": {
                "issueAccessToken": {
                    "accessToken": mint_token(TEST_SECRET, "user-1", Some("member"), expires_at),
                    "expiresAt": expires_at_iso,
                    "refreshToken": "rotated-refresh",
                    "refreshExpiresAt": refresh_expires_iso
                }
            }
        }));
    }

    state.data_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "data": { "viewer": { "id": "user-1" } } }))
}

async fn spawn_backend() -> (Arc<FakeBackend>, SocketAddr) {
    let state = Arc::new(FakeBackend {
        issue_calls: AtomicUsize::new(0),
        data_calls: AtomicUsize::new(0),
    });

    let handler_state = Arc::clone(&state);
    let router = Router::new().route(
        "/graphql",
        post(move |body: Json<Value>| graphql_handler(Arc::clone(&handler_state), body)),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake backend");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (state, addr)
}

fn expiring_claims(exp: u64) -> Claims {
    Claims {
        sub: "user-1".to_string(),
        role: None,
        iat: 0,
        exp,
    }
}

fn client_for(
    addr: SocketAddr,
    session: SessionState,
    refresh_token: Option<&str>,
) -> AuthenticatedClient<GraphqlTokenIssuer> {
    let graphql = GraphqlClient::new(format!("http://{}/graphql", addr));
    let issuer = GraphqlTokenIssuer::new(graphql.clone());
    let coordinator =
        RefreshCoordinator::new(issuer, session, refresh_token.map(str::to_string));
    AuthenticatedClient::new(graphql, coordinator)
}

const VIEWER_QUERY: &str = "query Viewer { viewer { id } }";

#[tokio::test]
async fn test_two_concurrent_requests_share_one_issuance() {
    let (backend, addr) = spawn_backend().await;

    // Access token expiring in 10 seconds: valid, but inside the refresh
    // threshold.
    let session = SessionState::new();
    session.set("stale-token".to_string(), expiring_claims(unix_now() + 10));
    let client = client_for(addr, session.clone(), Some("good-refresh"));

    let (a, b) = tokio::join!(
        client.execute::<Value>(VIEWER_QUERY, json!({})),
        client.execute::<Value>(VIEWER_QUERY, json!({})),
    );

    assert_eq!(a.unwrap()["viewer"]["id"], json!("user-1"));
    assert_eq!(b.unwrap()["viewer"]["id"], json!("user-1"));
    assert_eq!(
        backend.issue_calls.load(Ordering::SeqCst),
        1,
        "Concurrent callers must share a single issuance"
    );
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 2);

    // The session now holds the refreshed token.
    let session_token = session.get().access_token().map(str::to_string).unwrap();
    assert_ne!(session_token, "stale-token");
}

#[tokio::test]
async fn test_missing_refresh_token_raises_unauthorized_without_network() {
    let (backend, addr) = spawn_backend().await;
    let client = client_for(addr, SessionState::new(), None);

    let result = client.execute::<Value>(VIEWER_QUERY, json!({})).await;

    assert!(matches!(result, Err(ClientError::Unauthorized)));
    assert_eq!(backend.issue_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        backend.data_calls.load(Ordering::SeqCst),
        0,
        "No downstream call without a valid session"
    );
}

#[tokio::test]
async fn test_rejected_refresh_token_clears_session() {
    let (backend, addr) = spawn_backend().await;
    let session = SessionState::new();
    session.set("stale-token".to_string(), expiring_claims(unix_now() - 10));
    let client = client_for(addr, session.clone(), Some("forged-refresh"));

    let result = client.execute::<Value>(VIEWER_QUERY, json!({})).await;

    assert!(matches!(result, Err(ClientError::Unauthorized)));
    assert!(session.get().is_empty());
    assert_eq!(backend.issue_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rotated_refresh_token_spent_on_next_refresh() {
    let (backend, addr) = spawn_backend().await;
    let session = SessionState::new();
    let client = client_for(addr, session.clone(), Some("good-refresh"));

    client
        .execute::<Value>(VIEWER_QUERY, json!({}))
        .await
        .unwrap();

    // Drop the session so the next call must refresh again; the rotated
    // token is the only one the backend will still accept alongside the
    // original, and the coordinator must present it.
    session.clear();
    client
        .execute::<Value>(VIEWER_QUERY, json!({}))
        .await
        .unwrap();

    assert_eq!(backend.issue_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_explicit_token_overrides_ambient_session() {
    let (backend, addr) = spawn_backend().await;
    // Empty session and no refresh token: ambient calls would fail.
    let client = client_for(addr, SessionState::new(), None);
    let token = mint_token(TEST_SECRET, "user-2", None, unix_now() + 600);

    let result = client
        .execute_with_token::<Value>(&token, VIEWER_QUERY, json!({}))
        .await
        .unwrap();

    assert_eq!(result["viewer"]["id"], json!("user-1"));
    assert_eq!(backend.issue_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.data_calls.load(Ordering::SeqCst), 1);
}
