//! Sync Buffer
//!
//! Bounded FIFO of events waiting for the authority. Delivery order is
//! insertion order; priority decides what is evicted when full, and which
//! events jump ahead on a shutdown flush that cannot cover the backlog.

use std::collections::VecDeque;

use serde::Serialize;

use crate::logic::escalation::{AttemptStatus, Transition};
use crate::logic::ledger::{Severity, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    Critical,
}

/// One outbound event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Violation(Violation),
    Transition(Transition),
}

impl SyncEvent {
    pub fn priority(&self) -> Priority {
        match self {
            SyncEvent::Violation(v) => match v.severity {
                Severity::Critical => Priority::Critical,
                Severity::High => Priority::Normal,
                Severity::Low | Severity::Medium => Priority::Low,
            },
            SyncEvent::Transition(t) => match t.to {
                AttemptStatus::Terminated => Priority::Critical,
                _ => Priority::Normal,
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            SyncEvent::Violation(v) => format!("violation #{} {}", v.id, v.violation_type),
            SyncEvent::Transition(t) => format!("transition {} -> {}", t.from, t.to),
        }
    }
}

/// What happened to make room for an incoming event
#[derive(Debug, Clone, PartialEq)]
pub enum Overflow {
    /// Fit without loss
    None,
    /// An older, lower-priority event was dropped
    Evicted(SyncEvent),
    /// Nothing lower-priority to drop; the incoming event was discarded
    Discarded(SyncEvent),
    /// Critical event kept beyond capacity
    Overcommitted,
}

#[derive(Debug)]
pub struct SyncBuffer {
    capacity: usize,
    entries: VecDeque<SyncEvent>,
}

impl SyncBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, event: SyncEvent) -> Overflow {
        if self.entries.len() < self.capacity {
            self.entries.push_back(event);
            return Overflow::None;
        }

        let incoming = event.priority();
        // Oldest event of the lowest priority that is below the incoming one
        let victim = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.priority() < incoming)
            .min_by_key(|(idx, e)| (e.priority(), *idx))
            .map(|(idx, _)| idx);

        match victim {
            Some(idx) => {
                let evicted = self.entries.remove(idx);
                self.entries.push_back(event);
                evicted.map_or(Overflow::None, Overflow::Evicted)
            }
            None if incoming == Priority::Critical => {
                self.entries.push_back(event);
                Overflow::Overcommitted
            }
            None => Overflow::Discarded(event),
        }
    }

    pub fn front(&self) -> Option<&SyncEvent> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<SyncEvent> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move critical events to the front, keeping relative order on both
    /// sides. Returns how many were moved ahead.
    pub fn promote_critical(&mut self) -> usize {
        let (mut critical, rest): (VecDeque<SyncEvent>, VecDeque<SyncEvent>) = self
            .entries
            .drain(..)
            .partition(|e| e.priority() == Priority::Critical);
        let promoted = critical.len();
        critical.extend(rest);
        self.entries = critical;
        promoted
    }

    pub fn drain(&mut self) -> Vec<SyncEvent> {
        self.entries.drain(..).collect()
    }
}
