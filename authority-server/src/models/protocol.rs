//! Wire protocol shared with the proctoring engine (camelCase JSON)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attempt::{AttemptStatus, Severity};

/// POST /violation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub attempt_id: Uuid,
    /// Engine-assigned sequence number within the attempt
    pub id: u64,
    #[serde(rename = "type")]
    pub violation_type: String,
    pub severity: Severity,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    Continue,
    Terminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationResponse {
    pub action: ServerAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /state-transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub attempt_id: Uuid,
    pub from: AttemptStatus,
    pub to: AttemptStatus,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ack: bool,
}

/// POST /heartbeat
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub attempt_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub server_time: i64,
    pub directives: Vec<Directive>,
}

/// Server-pushed command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    TerminateDirective(TerminateDirective),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateDirective {
    pub attempt_id: Uuid,
    pub reason: String,
}

/// POST /admin/attempts/:id/terminate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminateRequest {
    pub reason: String,
}
