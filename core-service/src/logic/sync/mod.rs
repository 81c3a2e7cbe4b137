//! Sync Module - Engine to Authority Communication
//!
//! This module handles:
//! - Violation and state-transition delivery
//! - Retry with exponential backoff while offline
//! - Bounded buffering with priority eviction and ordered replay
//! - Terminate overrides (violation responses + heartbeat directives)

pub mod buffer;
pub mod client;
pub mod worker;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use buffer::{Overflow, Priority, SyncBuffer, SyncEvent};
pub use client::{
    HttpAuthority,
    RemoteAuthority,
    ServerAction,
    SyncError,
    TransitionReport,
    ViolationReport,
};
pub use worker::{DirectiveSink, FlushReport, SyncChannel, SyncStatus};
