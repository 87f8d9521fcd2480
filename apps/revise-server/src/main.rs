//! RevisePDF Server
//!
//! HTTP front end for the PDF transformation pipeline. Provides REST API
//! endpoints for:
//!
//! - PDF upload, processing and merging
//! - Metadata extraction and validation
//! - Subscription limits and tier listing
//! - Tier changes for billing integrations holding the admin token
//!
//! Upload and processing routes pass through the quota gate, which checks
//! the caller's subscription limits against the request's declared size
//! before the handler runs.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use clap::Parser;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod error;
mod gate;
mod state;
#[cfg(test)]
mod tests;

use api::{
    handle_health, handle_list_tiers, handle_merge, handle_metadata, handle_process_pdf,
    handle_subscription, handle_update_limits, handle_upload, handle_validate,
};
use state::AppState;

const MB: usize = 1024 * 1024;

/// Command-line arguments for the RevisePDF server
#[derive(Parser, Debug)]
#[command(name = "revise-server")]
#[command(about = "RevisePDF server for quota-gated PDF processing")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// SQLite database URL; defaults to the platform data directory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Processing timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,

    /// Rate limit: requests per second per IP
    #[arg(long, default_value = "10")]
    rate_limit: u32,

    /// Token required in `x-admin-token` for tier changes; unset disables them
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Largest accepted request body in megabytes
    #[arg(long, default_value = "150")]
    max_body_mb: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Routes, quota gate and tracing; rate limiting and CORS are added in `main`
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Quota-gated endpoints
        .route("/api/upload", post(handle_upload))
        .route("/api/process-pdf", post(handle_process_pdf))
        .route("/api/process-pdf/merge", post(handle_merge))
        // Inspection
        .route("/api/metadata", post(handle_metadata))
        .route("/api/validate", post(handle_validate))
        // Subscription
        .route("/api/subscription", get(handle_subscription))
        .route("/api/subscription/tiers", get(handle_list_tiers))
        .route("/api/subscription/limits", put(handle_update_limits))
        .layer(middleware::from_fn_with_state(state.clone(), gate::upload_gate))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting RevisePDF server on {}:{}", args.host, args.port);

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    let state = AppState::new(args.database_url, args.timeout_ms)
        .await?
        .with_admin_token(args.admin_token);
    if state.admin_token.is_none() {
        info!("ADMIN_TOKEN not set; subscription limit updates are disabled");
    }

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state, args.max_body_mb * MB)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!("Processing timeout: {}ms", args.timeout_ms);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
