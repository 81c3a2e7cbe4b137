//! Proctor handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::models::{AttemptRecord, TerminateRequest};
use crate::{AppError, AppResult, AppState};

/// Terminate an attempt; the engine picks the directive up on its next heartbeat
pub async fn terminate(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<TerminateRequest>,
) -> AppResult<Json<AttemptRecord>> {
    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(AppError::ValidationError("Reason is required".to_string()));
    }
    let record = state.store.terminate(attempt_id, reason.to_string()).await?;
    Ok(Json(record))
}

/// Get one attempt
pub async fn get(
    State(state): State<AppState>,
    Path(attempt_id): Path<Uuid>,
) -> AppResult<Json<AttemptRecord>> {
    let record = state.store.get(attempt_id).await?;
    Ok(Json(record))
}
