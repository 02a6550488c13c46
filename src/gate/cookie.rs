//! Cookie parsing and construction for the session gate.

use axum::http::{HeaderMap, header};

/// Cookie names plus the Secure flag, shared by the gate and the auth API.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Anonymous correlation id, present on every request.
    pub client_id_name: String,
    /// Short-lived bearer credential.
    pub access_name: String,
    /// Long-lived credential, rotated on use.
    pub refresh_name: String,
    /// Set the Secure attribute (true behind HTTPS).
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            client_id_name: "client_id".to_string(),
            access_name: "accessToken".to_string(),
            refresh_name: "refreshToken".to_string(),
            secure: false,
        }
    }
}

/// Client-id cookie lifetime: 1 year.
pub const CLIENT_ID_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

impl CookieConfig {
    /// `Set-Cookie` value for a session cookie. `max_age` of `None` yields a
    /// browser-session cookie.
    pub fn set(&self, name: &str, value: &str, max_age: Option<u64>) -> String {
        let max_age = max_age
            .map(|secs| format!("; Max-Age={}", secs))
            .unwrap_or_default();
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/{}{}",
            name,
            value,
            max_age,
            self.secure_suffix()
        )
    }

    /// `Set-Cookie` value that deletes a cookie.
    pub fn clear(&self, name: &str) -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
            name,
            self.secure_suffix()
        )
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }
}
