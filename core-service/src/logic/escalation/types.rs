//! Escalation Types
//!
//! Attempt status machine and the decisions that move it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::ledger::{Violation, ViolationType};

// ============================================================================
// ATTEMPT STATUS
// ============================================================================

/// Active -> Warned -> Terminated, with Completed as the normal exit.
/// Terminated and Completed are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Active,
    Warned,
    Terminated,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Active => "active",
            AttemptStatus::Warned => "warned",
            AttemptStatus::Terminated => "terminated",
            AttemptStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Terminated | AttemptStatus::Completed)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proctored exam session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: AttemptStatus,
}

impl Attempt {
    pub fn new(id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            status: AttemptStatus::Active,
        }
    }
}

// ============================================================================
// TERMINATION REASONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Zero-tolerance violation type
    CriticalViolation { violation_type: ViolationType },
    /// high + critical reached the severe threshold
    SevereCount { count: u32 },
    /// Total violations reached the termination threshold
    ViolationCount { count: u32 },
    /// Too many violations inside the rolling window
    RateWindow { count: u32, window_seconds: u64 },
    /// Remote authority override
    ServerDirective { reason: String },
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::CriticalViolation { violation_type } => {
                write!(f, "critical violation: {}", violation_type)
            }
            TerminationReason::SevereCount { count } => {
                write!(f, "{} high-severity violations", count)
            }
            TerminationReason::ViolationCount { count } => {
                write!(f, "{} violations recorded", count)
            }
            TerminationReason::RateWindow { count, window_seconds } => {
                write!(f, "{} violations within {}s", count, window_seconds)
            }
            TerminationReason::ServerDirective { reason } => {
                write!(f, "terminated by server: {}", reason)
            }
        }
    }
}

// ============================================================================
// DIRECTIVES (server -> client)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateDirective {
    pub attempt_id: Uuid,
    pub reason: String,
}

/// Server-pushed command, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    TerminateDirective(TerminateDirective),
}

// ============================================================================
// DECISIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub attempt_id: Uuid,
    pub from: AttemptStatus,
    pub to: AttemptStatus,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminationReason>,
}

/// Result of one policy evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Status after this evaluation
    pub status: AttemptStatus,
    /// Present only when the status changed
    pub transition: Option<Transition>,
    pub triggering_violation: Option<Violation>,
}

impl Decision {
    pub fn unchanged(status: AttemptStatus, triggering_violation: Option<Violation>) -> Self {
        Self {
            status,
            transition: None,
            triggering_violation,
        }
    }

    pub fn changed(&self) -> bool {
        self.transition.is_some()
    }

    pub fn reason(&self) -> Option<&TerminationReason> {
        self.transition.as_ref().and_then(|t| t.reason.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(AttemptStatus::Terminated.is_terminal());
        assert!(AttemptStatus::Completed.is_terminal());
        assert!(!AttemptStatus::Warned.is_terminal());
    }

    #[test]
    fn test_directive_wire_format() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"terminate_directive","attemptId":"{}","reason":"proctor decision"}}"#,
            id
        );
        let directive: Directive = serde_json::from_str(&json).unwrap();
        let Directive::TerminateDirective(d) = directive;
        assert_eq!(d.attempt_id, id);
        assert_eq!(d.reason, "proctor decision");
    }

    #[test]
    fn test_transition_serializes_lowercase_status() {
        let t = Transition {
            attempt_id: Uuid::nil(),
            from: AttemptStatus::Active,
            to: AttemptStatus::Warned,
            occurred_at: Utc::now(),
            reason: None,
        };
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["from"], "active");
        assert_eq!(value["to"], "warned");
        assert!(value.get("reason").is_none());
    }
}
