//! Logic Module - Proctoring Engines
//!
//! Chứa các engines xử lý một attempt: Calibration, Classifiers, Aggregator,
//! Escalation Policy, Sync Channel, Session Controller.
//!
//! ## Pipeline
//! - `signal/` - raw samples and classified signals
//! - `classifier/` - video/audio/window/input classifiers
//! - `baseline/` - room calibration before monitoring
//! - `ledger/` - debounce + per-attempt violation ledger (single writer)
//! - `escalation/` - pure Active -> Warned -> Terminated state machine
//! - `sync/` - delivery to the remote authority with retry and replay
//! - `session/` - orchestration, shutdown sequence, UI handle

// Foundations
pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod events;

// Pipeline
pub mod baseline;
pub mod classifier;
pub mod escalation;
pub mod ledger;
pub mod signal;

// Outer layers
pub mod journal;
pub mod session;
pub mod simulate;
pub mod sync;

pub use config::ProctorConfig;
pub use error::ProctorError;
pub use session::{ExamSubmitter, SessionController, SessionHandle, SessionSummary};
