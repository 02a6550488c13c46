//! Access-token claim decoding and verification.
//!
//! Two operations with very different trust levels: [`decode_unverified`]
//! reads a token's payload without touching the signature and exists only
//! for expiry estimation; [`JwtVerifier::verify`] performs full HS256
//! verification and is the only operation allowed to feed authorization
//! decisions.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims carried by an access token issued by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// User role, when the backend includes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix seconds)
    #[serde(default)]
    pub iat: u64,
    /// Expiration time (Unix seconds)
    pub exp: u64,
}

/// Errors from decoding or verifying a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Token cannot be parsed at all
    Malformed,
    /// Signature does not match the configured secret
    InvalidSignature,
    /// `exp` is in the past
    Expired,
    /// Issuer or audience does not match the configured values
    ClaimMismatch,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::ClaimMismatch => write!(f, "Token claims do not match"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Verifier for HS256 access tokens.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the given secret, optionally pinning the
    /// expected issuer and audience claims.
    pub fn new(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        if let Some(aud) = audience {
            validation.set_audience(&[aud]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Validate a token's signature, expiry, and configured claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(classify)?;
        Ok(token_data.claims)
    }
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::InvalidSubject => {
            TokenError::ClaimMismatch
        }
        _ => TokenError::Malformed,
    }
}

/// Decode a token's payload without checking the signature.
///
/// Never make an authorization decision from the result; this exists for
/// reading `exp` out of a token the process is about to use anyway.
pub fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed);
    }
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)
}

/// Current Unix time in seconds. A pre-epoch clock reads as 0, which makes
/// every token look expired rather than valid forever.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
