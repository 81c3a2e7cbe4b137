//! Violation Aggregator
//!
//! Single writer of one attempt's ledger. Every mutation (signal,
//! server directive, submission) goes through here, and the escalation
//! policy is evaluated synchronously after each one.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::rules::Debounce;
use super::types::{Severity, Violation, ViolationType};
use super::{Ledger, LedgerSnapshot};
use crate::logic::config::PolicyConfig;
use crate::logic::escalation::{self, Attempt, AttemptStatus, Decision, TerminateDirective};
use crate::logic::signal::Signal;

/// What one `ingest` did
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Signal consumed, no violation (debouncing, benign, low confidence)
    Ignored,
    /// One violation appended; carries the resulting decision
    Appended(Decision),
    /// Attempt already terminated/completed, ledger frozen
    Rejected,
}

pub struct Aggregator {
    attempt: Attempt,
    policy: PolicyConfig,
    ledger: Ledger,
    debounce: Debounce,
    next_id: u64,
}

impl Aggregator {
    pub fn new(attempt_id: Uuid, started_at: DateTime<Utc>, policy: PolicyConfig) -> Self {
        Self {
            attempt: Attempt::new(attempt_id, started_at),
            ledger: Ledger::new(policy.rate_window_seconds),
            debounce: Debounce::new(&policy),
            policy,
            next_id: 1,
        }
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn status(&self) -> AttemptStatus {
        self.attempt.status
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::from_ledger(self.attempt.id, self.attempt.status, &self.ledger)
    }

    /// Consume one classified signal
    pub fn ingest(&mut self, signal: &Signal) -> IngestOutcome {
        if self.attempt.status.is_terminal() {
            log::debug!(
                "[Aggregator] Dropping {} - attempt {} is {}",
                signal.category,
                self.attempt.id,
                self.attempt.status
            );
            return IngestOutcome::Rejected;
        }

        if signal.confidence < self.policy.min_signal_confidence {
            return IngestOutcome::Ignored;
        }

        let Some(violation_type) = self.debounce.observe(signal.category, signal.observed_at)
        else {
            return IngestOutcome::Ignored;
        };

        let violation = self.record(violation_type, signal);
        let decision = escalation::evaluate(
            &self.ledger,
            &self.policy,
            self.attempt.status,
            &violation,
        );
        self.apply(&decision);
        IngestOutcome::Appended(decision)
    }

    /// Server override. No-op once the attempt has ended.
    pub fn apply_directive(&mut self, directive: &TerminateDirective, at: DateTime<Utc>) -> Decision {
        if directive.attempt_id != self.attempt.id {
            log::warn!(
                "[Aggregator] Ignoring directive for attempt {} (current {})",
                directive.attempt_id,
                self.attempt.id
            );
            return Decision::unchanged(self.attempt.status, None);
        }
        if self.attempt.status.is_terminal() {
            log::info!(
                "[Aggregator] Directive after {} ignored: {}",
                self.attempt.status,
                directive.reason
            );
        }
        let decision = escalation::apply_directive(self.attempt.id, self.attempt.status, directive, at);
        self.apply(&decision);
        decision
    }

    /// Normal submission
    pub fn complete(&mut self, at: DateTime<Utc>) -> Decision {
        let decision = escalation::complete(self.attempt.id, self.attempt.status, at);
        self.apply(&decision);
        decision
    }

    fn record(&mut self, violation_type: ViolationType, signal: &Signal) -> Violation {
        let severity = if self.policy.is_critical(violation_type) {
            Severity::Critical
        } else {
            violation_type.base_severity()
        };

        // Keep the ledger timestamp-ordered even if sources interleave
        let occurred_at = match self.ledger.last_occurred_at() {
            Some(last) if last > signal.observed_at => last,
            _ => signal.observed_at,
        };

        let violation = Violation {
            id: self.next_id,
            attempt_id: self.attempt.id,
            violation_type,
            severity,
            description: describe(violation_type, signal),
            occurred_at,
        };
        self.next_id += 1;

        log::info!(
            "[Aggregator] Violation #{} {} ({}) for attempt {}",
            violation.id,
            violation.violation_type,
            violation.severity,
            self.attempt.id
        );
        self.ledger.append(violation.clone());
        violation
    }

    fn apply(&mut self, decision: &Decision) {
        if let Some(t) = &decision.transition {
            match &t.reason {
                Some(reason) => log::warn!(
                    "[Aggregator] Attempt {} {} -> {}: {}",
                    self.attempt.id,
                    t.from,
                    t.to,
                    reason
                ),
                None => log::info!("[Aggregator] Attempt {} {} -> {}", self.attempt.id, t.from, t.to),
            }
            self.attempt.status = t.to;
        }
    }
}

fn describe(t: ViolationType, signal: &Signal) -> String {
    format!(
        "{} ({}, confidence {:.2})",
        t.title(),
        signal.category,
        signal.confidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::signal::{SignalCategory, VideoCategory};
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn aggregator() -> Aggregator {
        Aggregator::new(Uuid::nil(), t(0), PolicyConfig::default())
    }

    fn video(c: VideoCategory, confidence: f32, at: i64) -> Signal {
        Signal::new(SignalCategory::Video(c), confidence, t(at))
    }

    #[test]
    fn test_single_no_person_is_not_a_violation() {
        let mut agg = aggregator();
        assert_eq!(agg.ingest(&video(VideoCategory::NoPerson, 0.9, 1)), IngestOutcome::Ignored);
        assert_eq!(agg.ledger().total(), 0);
    }

    #[test]
    fn test_low_confidence_neither_advances_nor_resets() {
        let mut agg = aggregator();
        for i in 0..4 {
            agg.ingest(&video(VideoCategory::NoPerson, 0.9, i));
        }
        // A shaky "one person" must not break the streak
        assert_eq!(agg.ingest(&video(VideoCategory::OnePerson, 0.2, 5)), IngestOutcome::Ignored);
        assert_eq!(agg.ingest(&video(VideoCategory::NoPerson, 0.3, 6)), IngestOutcome::Ignored);
        match agg.ingest(&video(VideoCategory::NoPerson, 0.9, 7)) {
            IngestOutcome::Appended(decision) => {
                let v = decision.triggering_violation.unwrap();
                assert_eq!(v.violation_type, ViolationType::NoFaceDetected);
                assert_eq!(v.severity, Severity::Medium);
                assert_eq!(v.occurred_at, t(7));
                assert_eq!(v.id, 1);
            }
            other => panic!("Expected violation, got {:?}", other),
        }
    }

    #[test]
    fn test_critical_type_override() {
        let mut agg = aggregator();
        let outcome = agg.ingest(&video(VideoCategory::CameraDisabled, 1.0, 3));
        let IngestOutcome::Appended(decision) = outcome else {
            panic!("Expected violation");
        };
        assert_eq!(decision.triggering_violation.unwrap().severity, Severity::Critical);
        assert_eq!(agg.status(), AttemptStatus::Terminated);
    }

    #[test]
    fn test_foreign_directive_ignored() {
        let mut agg = aggregator();
        let directive = TerminateDirective {
            attempt_id: Uuid::new_v4(),
            reason: "wrong attempt".to_string(),
        };
        let d = agg.apply_directive(&directive, t(1));
        assert!(!d.changed());
        assert_eq!(agg.status(), AttemptStatus::Active);
    }

    #[test]
    fn test_violation_ids_are_sequential() {
        let mut policy = PolicyConfig::default();
        policy.critical_violation_types.clear();
        let mut agg = Aggregator::new(Uuid::nil(), t(0), policy);
        agg.ingest(&video(VideoCategory::CameraDisabled, 1.0, 1));
        agg.ingest(&video(VideoCategory::CameraDisabled, 1.0, 300));
        let ids: Vec<u64> = agg.ledger().violations().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
