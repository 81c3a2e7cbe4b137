//! Session Diagnostics
//!
//! Lock-free counters for everything that degrades instead of failing:
//! shed signals, device and classification errors, sync trouble.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Diagnostics {
    signals_ingested: AtomicU64,
    signals_dropped: AtomicU64,
    classification_errors: AtomicU64,
    device_errors: AtomicU64,
    rejected_ingests: AtomicU64,
    sync_failures: AtomicU64,
    sync_evictions: AtomicU64,
    sync_delivered: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub signals_ingested: u64,
    /// Video/audio signals shed under backpressure
    pub signals_dropped: u64,
    pub classification_errors: u64,
    pub device_errors: u64,
    /// Signals that arrived after the attempt ended
    pub rejected_ingests: u64,
    pub sync_failures: u64,
    /// Events lost to sync buffer overflow
    pub sync_evictions: u64,
    pub sync_delivered: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self) {
        self.signals_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure_drop(&self) {
        self.signals_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification_error(&self) {
        self.classification_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_device_error(&self) {
        self.device_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_ingests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_failure(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_eviction(&self) {
        self.sync_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync_delivered(&self) {
        self.sync_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            signals_ingested: self.signals_ingested.load(Ordering::Relaxed),
            signals_dropped: self.signals_dropped.load(Ordering::Relaxed),
            classification_errors: self.classification_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            rejected_ingests: self.rejected_ingests.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            sync_evictions: self.sync_evictions.load(Ordering::Relaxed),
            sync_delivered: self.sync_delivered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let d = Diagnostics::new();
        d.record_backpressure_drop();
        d.record_backpressure_drop();
        d.record_sync_eviction();
        let snap = d.snapshot();
        assert_eq!(snap.signals_dropped, 2);
        assert_eq!(snap.sync_evictions, 1);
        assert_eq!(snap.device_errors, 0);
    }
}
