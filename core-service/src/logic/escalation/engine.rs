//! Escalation Engine
//!
//! Pure decision logic - no types, no I/O.
//! Input: Ledger + PolicyConfig + current status
//! Output: Decision

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::*;
use crate::logic::config::PolicyConfig;
use crate::logic::ledger::{Ledger, Severity, Violation};

// ============================================================================
// POLICY EVALUATION
// ============================================================================

/// Evaluate the ledger right after `latest` was appended
pub fn evaluate(
    ledger: &Ledger,
    policy: &PolicyConfig,
    current: AttemptStatus,
    latest: &Violation,
) -> Decision {
    if current.is_terminal() {
        return Decision::unchanged(current, Some(latest.clone()));
    }

    let (target, reason) = match termination_reason(ledger, policy, latest) {
        Some(reason) => (AttemptStatus::Terminated, Some(reason)),
        None if current == AttemptStatus::Active && should_warn(ledger, policy) => {
            (AttemptStatus::Warned, None)
        }
        None => (current, None),
    };

    if target == current {
        return Decision::unchanged(current, Some(latest.clone()));
    }

    Decision {
        status: target,
        transition: Some(Transition {
            attempt_id: latest.attempt_id,
            from: current,
            to: target,
            occurred_at: latest.occurred_at,
            reason,
        }),
        triggering_violation: Some(latest.clone()),
    }
}

/// First termination rule that holds, in precedence order
fn termination_reason(
    ledger: &Ledger,
    policy: &PolicyConfig,
    latest: &Violation,
) -> Option<TerminationReason> {
    if latest.severity == Severity::Critical {
        return Some(TerminationReason::CriticalViolation {
            violation_type: latest.violation_type,
        });
    }

    let severe = ledger.severity().severe();
    if severe >= policy.severe_limit() {
        return Some(TerminationReason::SevereCount { count: severe });
    }

    let total = ledger.total();
    if total >= policy.terminate_on_violation_count {
        return Some(TerminationReason::ViolationCount { count: total });
    }

    let recent = ledger.recent_count();
    if recent >= policy.rate_window_max_violations {
        return Some(TerminationReason::RateWindow {
            count: recent,
            window_seconds: policy.rate_window_seconds,
        });
    }

    None
}

fn should_warn(ledger: &Ledger, policy: &PolicyConfig) -> bool {
    ledger.high_count() >= policy.warn_on_high_severity_count
        || ledger.soft_count(policy) >= policy.warn_on_soft_violation_count
}

// ============================================================================
// OVERRIDES
// ============================================================================

/// Remote terminate directive. Always wins unless the attempt already ended.
pub fn apply_directive(
    attempt_id: Uuid,
    current: AttemptStatus,
    directive: &TerminateDirective,
    at: DateTime<Utc>,
) -> Decision {
    if current.is_terminal() {
        return Decision::unchanged(current, None);
    }
    Decision {
        status: AttemptStatus::Terminated,
        transition: Some(Transition {
            attempt_id,
            from: current,
            to: AttemptStatus::Terminated,
            occurred_at: at,
            reason: Some(TerminationReason::ServerDirective {
                reason: directive.reason.clone(),
            }),
        }),
        triggering_violation: None,
    }
}

/// Normal submission. Only Active/Warned may complete.
pub fn complete(attempt_id: Uuid, current: AttemptStatus, at: DateTime<Utc>) -> Decision {
    if current.is_terminal() {
        return Decision::unchanged(current, None);
    }
    Decision {
        status: AttemptStatus::Completed,
        transition: Some(Transition {
            attempt_id,
            from: current,
            to: AttemptStatus::Completed,
            occurred_at: at,
            reason: None,
        }),
        triggering_violation: None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
