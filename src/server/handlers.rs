//! HTTP handlers for session status and document delivery.

use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::{json, Value};

use super::upload::stage_multipart;
use super::AppState;
use crate::common::AppError;
use crate::delivery;

/// Readiness of the messaging session.
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "connected": state.session.is_connected(),
        "state": state.session.phase(),
    }))
}

/// Stage the uploaded PDFs and forward each one to the requested number.
pub async fn send_society(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = stage_multipart(multipart, &state.delivery).await?;
    let number = form.number();
    tracing::debug!(files = form.files.len(), "send_society");

    let report =
        delivery::send_documents(&state.session, &state.delivery, &number, form.files).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Files sent successfully",
        "sent": report.sent_count(),
        "results": report.results,
    })))
}
