use clap::Parser;
use tokengate::cli::{Args, build_config, init_logging, load_jwt_secret, validate_backend_url};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(backend_url) = validate_backend_url(&args.backend_url) else {
        std::process::exit(1);
    };

    let config = build_config(&args, backend_url, jwt_secret);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();
    info!(address = %local_addr, "Listening");

    // The embedding application mounts its page routes here; the binary on
    // its own serves just the auth API behind the gate.
    if let Err(e) = tokengate::run_server(config, axum::Router::new(), listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
