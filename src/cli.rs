//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;

use clap::Parser;
use tracing::error;
use url::Url;

use crate::ServerConfig;
use crate::backend::{GraphqlClient, GraphqlTokenIssuer};
use crate::gate::CookieConfig;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokengate",
    about = "Session front for a GraphQL auth backend: cookie gate, token refresh, logout"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5173")]
    pub port: u16,

    /// GraphQL endpoint of the auth backend
    #[arg(
        long,
        env = "AUTH_BACKEND_GRAPHQL",
        default_value = "http://localhost:4000/graphql"
    )]
    pub backend_url: String,

    /// Path to file containing the JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Expected `iss` claim on access tokens
    #[arg(long)]
    pub jwt_issuer: Option<String>,

    /// Expected `aud` claim on access tokens
    #[arg(long)]
    pub jwt_audience: Option<String>,

    /// Set the Secure attribute on session cookies (required behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Cookie name for the anonymous client id
    #[arg(long, default_value = "client_id")]
    pub client_id_cookie: String,

    /// Cookie name for the access token
    #[arg(long, default_value = "accessToken")]
    pub access_cookie: String,

    /// Cookie name for the refresh token
    #[arg(long, default_value = "refreshToken")]
    pub refresh_cookie: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the auth backend URL.
/// Returns None and logs an error if validation fails.
pub fn validate_backend_url(raw: &str) -> Option<Url> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %raw, error = %e, "Invalid backend URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %raw, "Backend URL must use http or https");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    backend_url: Url,
    jwt_secret: String,
) -> ServerConfig<GraphqlTokenIssuer> {
    let issuer = GraphqlTokenIssuer::new(GraphqlClient::new(backend_url.as_str()));

    ServerConfig {
        issuer: Arc::new(issuer),
        jwt_secret: jwt_secret.into_bytes(),
        jwt_issuer: args.jwt_issuer.clone(),
        jwt_audience: args.jwt_audience.clone(),
        cookies: CookieConfig {
            client_id_name: args.client_id_cookie.clone(),
            access_name: args.access_cookie.clone(),
            refresh_name: args.refresh_cookie.clone(),
            secure: args.secure_cookies,
        },
    }
}
