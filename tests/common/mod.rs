#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Router, body::Body, routing::get};
use jsonwebtoken::{EncodingKey, Header};
use tokengate::ServerConfig;
use tokengate::backend::{IssueError, IssuedToken, RotatedRefresh, TokenIssuer};
use tokengate::gate::{CookieConfig, CurrentUser};
use tokengate::jwt::{Claims, unix_now};

pub const TEST_SECRET: &[u8] = b"test-jwt-secret";

/// Encode an HS256 token the way the auth backend would.
pub fn mint_token(secret: &[u8], sub: &str, role: Option<&str>, exp: u64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.map(str::to_string),
        iat: unix_now(),
        exp,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("Failed to encode test token")
}

pub enum IssueBehavior {
    /// Mint a token for `user-1` valid for `ttl` seconds, optionally
    /// rotating the refresh token.
    Succeed {
        ttl: u64,
        rotate_to: Option<String>,
    },
    /// Reject every refresh token.
    Fail,
}

/// Scripted stand-in for the auth backend.
pub struct MockIssuer {
    pub behavior: IssueBehavior,
    calls: AtomicUsize,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl MockIssuer {
    pub fn succeeding(ttl: u64) -> Arc<Self> {
        Arc::new(Self {
            behavior: IssueBehavior::Succeed {
                ttl,
                rotate_to: None,
            },
            calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn rotating(ttl: u64, next: &str) -> Arc<Self> {
        Arc::new(Self {
            behavior: IssueBehavior::Succeed {
                ttl,
                rotate_to: Some(next.to_string()),
            },
            calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            behavior: IssueBehavior::Fail,
            calls: AtomicUsize::new(0),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        self.seen_refresh_tokens.lock().unwrap().clone()
    }
}

impl TokenIssuer for MockIssuer {
    async fn issue_access_token(&self, refresh_token: &str) -> Result<IssuedToken, IssueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        match &self.behavior {
            IssueBehavior::Succeed { ttl, rotate_to } => {
                let expires_at = unix_now() + ttl;
                Ok(IssuedToken {
                    access_token: mint_token(TEST_SECRET, "user-1", Some("member"), expires_at),
                    expires_at,
                    rotated_refresh: rotate_to.clone().map(|token| RotatedRefresh {
                        token,
                        expires_at: Some(expires_at + 3_600),
                    }),
                })
            }
            IssueBehavior::Fail => Err(IssueError::Backend("refresh token rejected".to_string())),
        }
    }
}

pub fn test_config(issuer: Arc<MockIssuer>) -> ServerConfig<MockIssuer> {
    ServerConfig {
        issuer,
        jwt_secret: TEST_SECRET.to_vec(),
        jwt_issuer: None,
        jwt_audience: None,
        cookies: CookieConfig::default(),
    }
}

/// The auth API plus two app routes: a public page and a protected one.
pub fn test_app(issuer: Arc<MockIssuer>) -> Router {
    let config = test_config(issuer);
    let routes = Router::new()
        .route("/feed", get(|| async { "feed" }))
        .route("/me", get(me_handler));
    tokengate::create_app(&config, routes)
}

async fn me_handler(CurrentUser(user): CurrentUser) -> String {
    user.id
}

/// Extract Set-Cookie headers from a response.
pub fn extract_set_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a cookie being cleared (Max-Age=0).
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && c.contains("Max-Age=0"))
}

/// Check if cookies contain a freshly set (non-cleared) cookie.
pub fn has_new_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=", cookie_name)) && !c.contains("Max-Age=0"))
}

/// Value of the first Set-Cookie for `cookie_name`, without attributes.
pub fn cookie_value(cookies: &[String], cookie_name: &str) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", cookie_name)))
        .and_then(|c| c.split(';').next())
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
}
