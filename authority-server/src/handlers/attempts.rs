//! Engine-facing handlers: violations, transitions, heartbeat

use axum::{extract::State, Json};
use chrono::Utc;

use crate::models::{
    AckResponse, HeartbeatRequest, HeartbeatResponse, TransitionReport, ViolationReport,
    ViolationResponse,
};
use crate::{AppError, AppResult, AppState};

/// Report one violation
pub async fn report_violation(
    State(state): State<AppState>,
    Json(report): Json<ViolationReport>,
) -> AppResult<Json<ViolationResponse>> {
    if report.violation_type.trim().is_empty() {
        return Err(AppError::ValidationError("Violation type is required".to_string()));
    }
    if report.id == 0 {
        return Err(AppError::ValidationError("Violation id starts at 1".to_string()));
    }

    tracing::info!(
        "Violation #{} {} ({:?}) for attempt {}",
        report.id,
        report.violation_type,
        report.severity,
        report.attempt_id
    );
    let response = state.store.record_violation(report, &state.config).await;
    Ok(Json(response))
}

/// Report a status change
pub async fn state_transition(
    State(state): State<AppState>,
    Json(report): Json<TransitionReport>,
) -> AppResult<Json<AckResponse>> {
    if report.from == report.to {
        return Err(AppError::ValidationError(format!(
            "Transition {:?} -> {:?} is not a change",
            report.from, report.to
        )));
    }
    state.store.record_transition(report).await;
    Ok(Json(AckResponse { ack: true }))
}

/// Liveness + directive poll
pub async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> AppResult<Json<HeartbeatResponse>> {
    let directives = state.store.heartbeat(req.attempt_id).await;
    if !directives.is_empty() {
        tracing::info!("Delivering {} directives to {}", directives.len(), req.attempt_id);
    }

    Ok(Json(HeartbeatResponse {
        server_time: Utc::now().timestamp(),
        directives,
    }))
}
