//! Sliding time window
//!
//! Timestamps inside `[latest - span, latest]`. Time only moves forward
//! through `push`; there is no wall clock in here.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// `secs` as a time delta, saturating at the largest representable span
pub(crate) fn span_seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    span: Duration,
    entries: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    pub fn new(span_secs: u64) -> Self {
        Self {
            span: span_seconds(span_secs),
            entries: VecDeque::new(),
        }
    }

    /// Record one occurrence and return how many fall inside the window
    pub fn push(&mut self, at: DateTime<Utc>) -> usize {
        self.entries.push_back(at);
        self.prune(at);
        self.entries.len()
    }

    /// Drop everything older than `now - span`
    pub fn prune(&mut self, now: DateTime<Utc>) {
        // Span reaches past the start of time: nothing is old enough
        let Some(cutoff) = now.checked_sub_signed(self.span) else {
            return;
        };
        while let Some(front) = self.entries.front() {
            if *front < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
