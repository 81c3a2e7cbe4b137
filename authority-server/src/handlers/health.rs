//! Liveness plus a summary of what the store currently holds

use axum::{extract::State, Json};
use serde::Serialize;

use crate::store::AttemptStats;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    environment: String,
    max_violations_per_attempt: usize,
    attempts: AttemptStats,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let attempts = state.store.stats().await;
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        environment: state.config.environment.clone(),
        max_violations_per_attempt: state.config.max_violations_per_attempt,
        attempts,
    })
}
