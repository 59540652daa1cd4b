//! Prediction handlers
//!
//! Both entry points hand their payload to a pipeline on the blocking
//! pool; scoring and Tree SHAP are CPU-bound.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PredictJsonRequest, PredictResponse};
use crate::pipeline::Pipeline;
use crate::AppState;

/// Multipart field carrying the CSV file
const FILE_FIELD: &str = "file";

enum Payload {
    Csv(Bytes),
    Json(Vec<Map<String, Value>>),
}

/// Score an uploaded CSV file
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<PredictResponse>> {
    let request_id = Uuid::new_v4();

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) || field.file_name().is_some() {
            let data = field.bytes().await?;
            tracing::debug!(%request_id, bytes = data.len(), "Received CSV upload");
            return run(state, request_id, Payload::Csv(data)).await;
        }
    }

    Err(AppError::BadRequest(format!("Missing multipart field '{}'", FILE_FIELD)))
}

/// Score rows sent as a JSON body
pub async fn json(
    State(state): State<AppState>,
    body: Result<Json<PredictJsonRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let request_id = Uuid::new_v4();

    let Json(request) = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    })?;
    tracing::debug!(%request_id, rows = request.rows.len(), "Received JSON rows");

    run(state, request_id, Payload::Json(request.rows)).await
}

async fn run(state: AppState, request_id: Uuid, payload: Payload) -> AppResult<Json<PredictResponse>> {
    let ctx = state.ctx.clone();
    let max_rows = state.config.max_rows;
    let span = tracing::info_span!("predict", %request_id);

    let result = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let pipeline = Pipeline::new(&ctx, request_id).with_max_rows(max_rows);
        match payload {
            Payload::Csv(bytes) => pipeline.run_csv(&bytes),
            Payload::Json(rows) => pipeline.run_json(&rows),
        }
    })
    .await?;

    let batch = result.map_err(|rejected| AppError::rejected(request_id, rejected))?;
    Ok(Json(PredictResponse { request_id, batch }))
}
