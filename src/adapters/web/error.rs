//! HTTP error responses for web adapter.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::domain::error::RebalanceError;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Generic 500; the cause is logged, never returned.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }
}

pub fn status_from_error(err: &RebalanceError) -> StatusCode {
    if err.is_configuration() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    match err {
        RebalanceError::DataNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RebalanceError> for WebError {
    fn from(err: RebalanceError) -> Self {
        let status = status_from_error(&err);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "request failed");
            return Self::internal();
        }
        let message = match &err {
            RebalanceError::DataNotFound { field, .. } => format!("no data for field {}", field),
            _ => err.to_string(),
        };
        Self::new(status, message)
    }
}

/// Every body rejection (syntax, schema, missing content type) is a 422.
impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
