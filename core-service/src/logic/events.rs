//! Decision Events - Session to UI
//!
//! Every decision worth showing (new violation, status change) is published
//! on a broadcast channel. Any number of UI collaborators can subscribe.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::logic::escalation::{AttemptStatus, Decision, TerminationReason};
use crate::logic::ledger::Violation;

/// Event names, for bridges that forward to a named-event transport
pub mod names {
    pub const VIOLATION_RECORDED: &str = "proctor:violation";
    pub const STATUS_CHANGED: &str = "proctor:status";
}

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEvent {
    pub attempt_id: Uuid,
    pub decision: AttemptStatus,
    /// Status before this decision, `None` when unchanged
    pub previous: Option<AttemptStatus>,
    pub triggering_violation: Option<Violation>,
    pub reason: Option<TerminationReason>,
    pub at: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn from_decision(attempt_id: Uuid, decision: &Decision) -> Self {
        let at = decision
            .transition
            .as_ref()
            .map(|t| t.occurred_at)
            .or_else(|| decision.triggering_violation.as_ref().map(|v| v.occurred_at))
            .unwrap_or_else(Utc::now);
        Self {
            attempt_id,
            decision: decision.status,
            previous: decision.transition.as_ref().map(|t| t.from),
            triggering_violation: decision.triggering_violation.clone(),
            reason: decision.reason().cloned(),
            at,
        }
    }

    pub fn name(&self) -> &'static str {
        if self.previous.is_some() {
            names::STATUS_CHANGED
        } else {
            names::VIOLATION_RECORDED
        }
    }
}

/// Broadcast bus for decision events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DecisionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers
    pub fn emit(&self, event: DecisionEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            // Silent: a session without a UI is valid
            log::debug!("[Events] No subscribers, '{}' dropped", name);
        }
    }
}
