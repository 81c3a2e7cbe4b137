//! Ledger Module - Violation Aggregation
//!
//! The per-attempt, append-only record of violations and the single writer
//! that turns classified Signals into them.
//!
//! ## Structure
//! - `types`: Severity, ViolationType, Violation
//! - `window`: rolling time window used by rate rules
//! - `rules`: category -> violation mapping + debounce state
//! - `aggregator`: the single writer (ingest / directives / completion)
//!
//! ## Usage
//! ```ignore
//! let mut aggregator = Aggregator::new(attempt_id, Utc::now(), policy);
//! match aggregator.ingest(&signal) {
//!     IngestOutcome::Appended(decision) => publish(decision),
//!     IngestOutcome::Ignored => {}
//!     IngestOutcome::Rejected => {}
//! }
//! ```

pub mod aggregator;
pub mod rules;
pub mod types;
pub mod window;

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::config::PolicyConfig;
use crate::logic::escalation::AttemptStatus;

pub use aggregator::{Aggregator, IngestOutcome};
pub use rules::{Debounce, TriggerRule};
pub use types::{Severity, Violation, ViolationType};
pub use window::SlidingWindow;

// ============================================================================
// COUNTERS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounters {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl SeverityCounters {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.low + self.medium + self.high + self.critical
    }

    /// high + critical
    pub fn severe(&self) -> u32 {
        self.high + self.critical
    }
}

// ============================================================================
// LEDGER
// ============================================================================

/// Append-only violation record of one attempt
#[derive(Debug, Clone)]
pub struct Ledger {
    violations: Vec<Violation>,
    severity: SeverityCounters,
    /// Per-type count inside the rolling rate window
    window_counters: BTreeMap<ViolationType, u32>,
    /// Violations inside the rolling rate window
    recent: VecDeque<Violation>,
    rate_window: Duration,
}

impl Ledger {
    pub fn new(rate_window_seconds: u64) -> Self {
        Self {
            violations: Vec::new(),
            severity: SeverityCounters::default(),
            window_counters: BTreeMap::new(),
            recent: VecDeque::new(),
            rate_window: window::span_seconds(rate_window_seconds),
        }
    }

    /// Timestamp of the newest violation
    pub fn last_occurred_at(&self) -> Option<DateTime<Utc>> {
        self.violations.last().map(|v| v.occurred_at)
    }

    pub(crate) fn append(&mut self, violation: Violation) {
        self.severity.record(violation.severity);
        let now = violation.occurred_at;
        self.recent.push_back(violation.clone());
        *self.window_counters.entry(violation.violation_type).or_insert(0) += 1;
        self.violations.push(violation);
        self.prune(now);
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.rate_window) else {
            return;
        };
        while let Some(front) = self.recent.front() {
            if front.occurred_at >= cutoff {
                break;
            }
            let t = front.violation_type;
            self.recent.pop_front();
            if let Some(count) = self.window_counters.get_mut(&t) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.window_counters.remove(&t);
                }
            }
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn total(&self) -> u32 {
        self.violations.len() as u32
    }

    pub fn severity(&self) -> SeverityCounters {
        self.severity
    }

    pub fn high_count(&self) -> u32 {
        self.severity.high
    }

    pub fn critical_count(&self) -> u32 {
        self.severity.critical
    }

    pub fn recent_count(&self) -> u32 {
        self.recent.len() as u32
    }

    pub fn window_count(&self, t: ViolationType) -> u32 {
        self.window_counters.get(&t).copied().unwrap_or(0)
    }

    /// Violations whose type is configured as soft
    pub fn soft_count(&self, policy: &PolicyConfig) -> u32 {
        self.violations
            .iter()
            .filter(|v| policy.is_soft(v.violation_type))
            .count() as u32
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Read-only copy handed to readers outside the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub violations: Vec<Violation>,
    pub severity: SeverityCounters,
    pub window_counters: BTreeMap<ViolationType, u32>,
    pub recent_count: u32,
}

impl LedgerSnapshot {
    pub fn empty(attempt_id: Uuid) -> Self {
        Self {
            attempt_id,
            status: AttemptStatus::Active,
            violations: Vec::new(),
            severity: SeverityCounters::default(),
            window_counters: BTreeMap::new(),
            recent_count: 0,
        }
    }

    pub fn from_ledger(attempt_id: Uuid, status: AttemptStatus, ledger: &Ledger) -> Self {
        Self {
            attempt_id,
            status,
            violations: ledger.violations.clone(),
            severity: ledger.severity,
            window_counters: ledger.window_counters.clone(),
            recent_count: ledger.recent_count(),
        }
    }
}
