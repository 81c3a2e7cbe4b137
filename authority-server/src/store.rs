//! In-memory attempt store
//!
//! Keyed by attempt id; attempts are created on first contact.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::models::{
    AttemptRecord, AttemptStatus, Directive, ServerAction, Severity, StoredTransition,
    StoredViolation, TerminateDirective, TransitionReport, ViolationReport, ViolationResponse,
};
use crate::{AppError, AppResult};

/// Attempt counts by status, for the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStats {
    pub total: usize,
    pub active: usize,
    pub warned: usize,
    pub terminated: usize,
    pub completed: usize,
    pub pending_directives: usize,
}

#[derive(Clone, Default)]
pub struct Store {
    attempts: Arc<RwLock<HashMap<Uuid, AttemptRecord>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation and decide whether the attempt may continue
    pub async fn record_violation(&self, report: ViolationReport, config: &Config) -> ViolationResponse {
        let mut attempts = self.attempts.write().await;
        let record = attempts
            .entry(report.attempt_id)
            .or_insert_with(|| AttemptRecord::new(report.attempt_id));

        if record.has_violation(report.id) {
            tracing::debug!(
                "Duplicate violation #{} {} for {}",
                report.id,
                report.violation_type,
                report.attempt_id
            );
        } else {
            record.violations.push(StoredViolation {
                id: report.id,
                violation_type: report.violation_type.clone(),
                severity: report.severity,
                description: report.description,
                occurred_at: report.occurred_at,
                received_at: Utc::now(),
            });
        }

        match record.status {
            AttemptStatus::Terminated => {
                return terminate_response(record.termination_reason.clone());
            }
            AttemptStatus::Completed => return continue_response(),
            AttemptStatus::Active | AttemptStatus::Warned => {}
        }

        let reason = if config.terminate_on_critical && report.severity == Severity::Critical {
            Some(format!("critical violation: {}", report.violation_type))
        } else if record.violations.len() >= config.max_violations_per_attempt {
            Some(format!("{} violations recorded", record.violations.len()))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::warn!("Terminating attempt {}: {}", report.attempt_id, reason);
                record.status = AttemptStatus::Terminated;
                record.termination_reason = Some(reason.clone());
                terminate_response(Some(reason))
            }
            None => continue_response(),
        }
    }

    pub async fn record_transition(&self, report: TransitionReport) {
        let mut attempts = self.attempts.write().await;
        let record = attempts
            .entry(report.attempt_id)
            .or_insert_with(|| AttemptRecord::new(report.attempt_id));

        tracing::info!("Attempt {}: {:?} -> {:?}", report.attempt_id, report.from, report.to);
        record.transitions.push(StoredTransition {
            from: report.from,
            to: report.to,
            occurred_at: report.occurred_at,
            reason: report.reason.clone(),
        });

        // A server-side termination is never overridden by the client
        if record.status == AttemptStatus::Terminated && report.to != AttemptStatus::Terminated {
            tracing::warn!(
                "Attempt {} reported {:?} after server termination",
                report.attempt_id,
                report.to
            );
            return;
        }
        record.status = report.to;
        if report.to == AttemptStatus::Terminated && record.termination_reason.is_none() {
            record.termination_reason = report.reason;
        }
    }

    /// Touch the attempt and hand out pending directives
    pub async fn heartbeat(&self, attempt_id: Uuid) -> Vec<Directive> {
        let mut attempts = self.attempts.write().await;
        let record = attempts
            .entry(attempt_id)
            .or_insert_with(|| AttemptRecord::new(attempt_id));
        record.last_heartbeat = Some(Utc::now());
        std::mem::take(&mut record.pending_directives)
    }

    /// Proctor-initiated termination, delivered with the next heartbeat
    pub async fn terminate(&self, attempt_id: Uuid, reason: String) -> AppResult<AttemptRecord> {
        let mut attempts = self.attempts.write().await;
        let record = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))?;

        if record.status == AttemptStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Attempt {} was already submitted",
                attempt_id
            )));
        }

        if record.status != AttemptStatus::Terminated {
            record.status = AttemptStatus::Terminated;
            record.termination_reason = Some(reason.clone());
        }
        record
            .pending_directives
            .push(Directive::TerminateDirective(TerminateDirective { attempt_id, reason }));

        tracing::warn!("Attempt {} terminated by proctor", attempt_id);
        Ok(record.clone())
    }

    pub async fn stats(&self) -> AttemptStats {
        let attempts = self.attempts.read().await;
        attempts.values().fold(AttemptStats::default(), |mut stats, record| {
            stats.total += 1;
            stats.pending_directives += record.pending_directives.len();
            match record.status {
                AttemptStatus::Active => stats.active += 1,
                AttemptStatus::Warned => stats.warned += 1,
                AttemptStatus::Terminated => stats.terminated += 1,
                AttemptStatus::Completed => stats.completed += 1,
            }
            stats
        })
    }

    pub async fn get(&self, attempt_id: Uuid) -> AppResult<AttemptRecord> {
        self.attempts
            .read()
            .await
            .get(&attempt_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", attempt_id)))
    }
}

fn continue_response() -> ViolationResponse {
    ViolationResponse {
        action: ServerAction::Continue,
        reason: None,
    }
}

fn terminate_response(reason: Option<String>) -> ViolationResponse {
    ViolationResponse {
        action: ServerAction::Terminate,
        reason,
    }
}
