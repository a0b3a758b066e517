//! HTTP-facing error type shared by all handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::delivery::{DeliveryError, DeliveryReport};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    SessionNotReady(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Dispatch aborted mid-batch; the report says which files made it.
    #[error("Failed to send")]
    DeliveryFailed(DeliveryReport),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SessionNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DeliveryFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        let message = err.to_string();
        match err {
            DeliveryError::SessionNotReady => AppError::SessionNotReady(message),
            DeliveryError::InvalidNumber | DeliveryError::NoFiles => AppError::BadRequest(message),
            DeliveryError::Aborted(report) => AppError::DeliveryFailed(report),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::DeliveryFailed(report) => {
                tracing::error!(
                    recipient = %report.recipient,
                    sent = report.sent_count(),
                    total = report.results.len(),
                    "delivery aborted"
                );
                json!({
                    "success": false,
                    "error": self.to_string(),
                    "sent": report.sent_count(),
                    "results": report.results,
                })
            }
            AppError::Internal(err) => {
                // Internal detail stays in the log
                tracing::error!(error = ?err, "request failed");
                json!({ "success": false, "error": "Internal server error" })
            }
            _ => json!({ "success": false, "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
