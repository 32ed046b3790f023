use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::worker::ScanSummary;

/// Runs one scheduler invocation immediately.
pub async fn trigger(State(state): State<AppState>) -> Result<Json<ScanSummary>, ApiError> {
    let summary = state.scan.scan().await?;
    info!(
        submitted_jobs = summary.submitted_jobs,
        failed_jobs = summary.failed_jobs,
        "Scan triggered over HTTP"
    );
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    pub file_url: String,
}

/// Accepts an upload notification and queues it for the next scan.
pub async fn upload(
    State(state): State<AppState>,
    Json(body): Json<UploadEvent>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if body.file_url.trim().is_empty() {
        return Err(ApiError::BadRequest("fileUrl is required".to_string()));
    }
    let id = state.scan.enqueue_upload(&body.file_url).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "id": id, "queue": state.settings.queue.start_name })),
    ))
}
