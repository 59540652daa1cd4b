//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    model_loaded: bool,
    model_sha256: String,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let info = state.ctx.info();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model_loaded: info.tree_count > 0,
        model_sha256: info.sha256.clone(),
    })
}
