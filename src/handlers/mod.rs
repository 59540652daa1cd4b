//! HTTP handlers

pub mod health;
pub mod model;
pub mod predict;


use axum::Json;
use serde_json::{json, Value};

pub async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to the RiskScore bankruptcy risk API" }))
}
