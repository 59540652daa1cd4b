//! RiskScore Server
//!
//! Bankruptcy risk scoring over HTTP. Every request is validated against
//! the feature schema, scored by a gradient-boosted tree ensemble, explained
//! with exact Tree SHAP attributions, and validated again on the way out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RISKSCORE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────────────────────────────────┐  │
//! │  │  API      │   │  Pipeline (blocking pool)            │  │
//! │  │  (Axum)   │──▶│  parse ─▶ input rules ─▶ model       │  │
//! │  │           │   │        ─▶ Tree SHAP ─▶ output rules  │  │
//! │  └───────────┘   └──────────────────┬───────────────────┘  │
//! │                                     ▼                      │
//! │                      ┌──────────────────────────┐          │
//! │                      │ Arc<ModelContext>        │          │
//! │                      │ (ensemble, rules, meta)  │          │
//! │                      └──────────────────────────┘          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod ensemble;
mod error;
mod explain;
mod handlers;
mod models;
mod pipeline;
mod schema;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

pub use error::{AppError, AppResult};
use pipeline::ModelContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let json_logs = config.json_logs();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "riskscore_server=debug,tower_http=debug".into()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    config.validate().context("Invalid configuration")?;

    tracing::info!("RiskScore Server starting...");
    tracing::info!("Environment: {}", config.environment);
    if config.is_production() && !json_logs {
        tracing::warn!("Plain-text logging in production, set LOG_FORMAT=json");
    }

    // Load model
    let loaded = ensemble::load_model(&config.model_path)
        .with_context(|| format!("Failed to load model from {}", config.model_path))?;
    let ctx = ModelContext::from_loaded(loaded).context("Failed to build model context")?;
    tracing::info!(
        "Model ready: {} trees, baseline {:.6}",
        ctx.info().tree_count,
        ctx.baseline()
    );

    // Build application state
    let state = AppState {
        ctx: Arc::new(ctx),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ModelContext>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    // Public routes
    let public_routes = Router::new()
        .route("/", get(handlers::welcome))
        .route("/health", get(handlers::health::check))
        .route("/api/v1/model", get(handlers::model::info));

    // Prediction routes
    let predict_routes = Router::new()
        .route("/predict", post(handlers::predict::upload))
        .route("/api/v1/predict", post(handlers::predict::upload))
        .route("/api/v1/predict/json", post(handlers::predict::json))
        .layer(DefaultBodyLimit::max(body_limit));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(predict_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
