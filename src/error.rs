//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::pipeline::{Rejected, Rejection};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Transport errors
    BadRequest(String),
    PayloadTooLarge(String),

    // Pipeline rejections
    Rejected { request_id: Uuid, rejected: Rejected },

    // Generic errors
    InternalError(String),
}

impl AppError {
    pub fn rejected(request_id: Uuid, rejected: Rejected) -> Self {
        AppError::Rejected { request_id, rejected }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail, extra) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg, None)
            }
            AppError::Rejected { request_id, rejected } => rejection_parts(request_id, rejected),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": code,
            "detail": detail,
            "status": status.as_u16()
        });
        if let (Some(extra), Some(map)) = (extra, body.as_object_mut()) {
            map.extend(extra);
        }

        (status, Json(body)).into_response()
    }
}

type Parts = (StatusCode, &'static str, String, Option<serde_json::Map<String, Value>>);

/// Client faults carry their full reason; server faults are reduced to a code
fn rejection_parts(request_id: Uuid, rejected: Rejected) -> Parts {
    let code = rejected.reason.code();
    let mut extra = serde_json::Map::new();
    extra.insert("request_id".to_string(), json!(request_id));

    match rejected.reason {
        Rejection::Parse(err) => (StatusCode::BAD_REQUEST, code, err.to_string(), Some(extra)),
        Rejection::InputValidation(violations) => {
            extra.insert("violations".to_string(), json!(violations));
            (
                StatusCode::BAD_REQUEST,
                code,
                "Input data validation failed".to_string(),
                Some(extra),
            )
        }
        Rejection::OutputValidation(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "Output data validation failed".to_string(),
            Some(extra),
        ),
        Rejection::Inference(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "Internal error during prediction".to_string(),
            Some(extra),
        ),
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::InternalError(format!("prediction worker failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::orchestrator::Stage;
    use crate::pipeline::parse::ParseError;
    use crate::schema::{Violation, ViolationKind};

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_input_rejection_lists_violations() {
        let violation = Violation {
            field: "Quick Ratio".to_string(),
            kind: ViolationKind::RangeViolation,
            unexpected_count: 1,
            sample_rows: vec![0],
            detail: "value outside [0, 10000000000]".to_string(),
        };
        let err = AppError::rejected(
            Uuid::nil(),
            Rejected {
                stage: Stage::InputValidated,
                reason: Rejection::InputValidation(vec![violation]),
            },
        );

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "SCHEMA_RANGE_VIOLATION");
        assert_eq!(body["status"], 400);
        assert_eq!(body["violations"][0]["code"], "SCHEMA_RANGE_VIOLATION");
        assert_eq!(body["violations"][0]["field"], "Quick Ratio");
        assert_eq!(body["request_id"], Uuid::nil().to_string());
    }

    #[tokio::test]
    async fn test_parse_rejection() {
        let err = AppError::rejected(
            Uuid::nil(),
            Rejected { stage: Stage::Parsed, reason: Rejection::Parse(ParseError::Empty) },
        );

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "PARSE_ERROR");
        assert_eq!(body["detail"], "The uploaded file is empty");
    }

    #[tokio::test]
    async fn test_internal_details_not_leaked() {
        let (status, body) = body_json(AppError::InternalError("secret path /etc/model".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("/etc/model"));

        let err = AppError::rejected(
            Uuid::nil(),
            Rejected { stage: Stage::OutputValidated, reason: Rejection::OutputValidation(Vec::new()) },
        );
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "OUTPUT_VALIDATION_FAILURE");
        assert!(body.get("violations").is_none());
    }
}
