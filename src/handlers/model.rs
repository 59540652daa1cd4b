//! Model metadata handler

use axum::{extract::State, Json};

use crate::models::ModelInfo;
use crate::AppState;

/// Loaded model, its feature layout and attribution baseline
pub async fn info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(state.ctx.info().clone())
}
