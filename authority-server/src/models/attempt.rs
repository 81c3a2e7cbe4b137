//! Attempt model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Active,
    Warned,
    Terminated,
    Completed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Terminated | AttemptStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredViolation {
    pub id: u64,
    #[serde(rename = "type")]
    pub violation_type: String,
    pub severity: Severity,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransition {
    pub from: AttemptStatus,
    pub to: AttemptStatus,
    pub occurred_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Server-side view of one attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub violations: Vec<StoredViolation>,
    pub transitions: Vec<StoredTransition>,
    pub termination_reason: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Directives not yet picked up by a heartbeat
    #[serde(skip)]
    pub pending_directives: Vec<super::Directive>,
}

impl AttemptRecord {
    pub fn new(attempt_id: Uuid) -> Self {
        Self {
            attempt_id,
            status: AttemptStatus::Active,
            violations: Vec::new(),
            transitions: Vec::new(),
            termination_reason: None,
            first_seen: Utc::now(),
            last_heartbeat: None,
            pending_directives: Vec::new(),
        }
    }

    /// Retried deliveries carry the same engine id
    pub fn has_violation(&self, id: u64) -> bool {
        self.violations.iter().any(|v| v.id == id)
    }
}
