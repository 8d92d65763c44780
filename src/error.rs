// src/error.rs
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::services::ServiceError;
use crate::store::StoreError;
use crate::validation::Violations;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(StoreError),
    NotFound(String),
    ValidationError(Violations),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Storage failure");
                let body = Json(json!({ "error": "Database error occurred" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            AppError::ValidationError(violations) => {
                let body = Json(json!({
                    "error": violations.to_string(),
                    "errors": violations,
                }));
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(violations) => AppError::ValidationError(violations),
            ServiceError::NotFound => AppError::not_found("Product not found"),
            ServiceError::Storage(e) => AppError::DatabaseError(e),
        }
    }
}

// Malformed, mistyped or unlabelled bodies are reported like any other
// validation failure.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let mut violations = Violations::default();
        violations.add("body", rejection.body_text());
        AppError::ValidationError(violations)
    }
}
