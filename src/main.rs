//! CMT Admin Backend
//! Customers, branches and client applications behind a token and role guard

use anyhow::{Context, Result};
use axum::middleware;
use clap::Parser;
use cmt_admin_backend::{
    middleware::{request_logging, RateLimitLayer},
    router, AppState, Config, Database,
};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    info!(
        port = config.port,
        db_path = %config.db_path,
        token_ttl_minutes = config.token_ttl_minutes,
        expired_token_policy = ?config.expired_token_policy,
        "Starting CMT admin backend"
    );

    let db = Database::open(&config.db_path)?;
    db.seed_defaults(&config.admin_email, &config.admin_password)
        .await
        .context("Failed to seed defaults")?;

    let limiter = RateLimitLayer::new(config.rate_limit());
    tokio::spawn(rate_limit_cleanup(limiter.clone()));

    let state = AppState::new(db, config.token_ttl(), config.expired_token_policy);
    let app = router(state, limiter)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn rate_limit_cleanup(limiter: RateLimitLayer) {
    let mut ticker = tokio::time::interval(limiter.window().max(Duration::from_secs(30)));
    loop {
        ticker.tick().await;
        limiter.cleanup();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cmt_admin_backend=debug,cmt_admin=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also the crate directory, when started from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
