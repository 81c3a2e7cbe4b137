//! Session Module - Attempt Orchestration
//!
//! Wires samplers, classifiers, the aggregator actor, the sync worker and
//! the journal for one attempt.
//!
//! ## Structure
//! - `queue`: bounded signal queue with backpressure shedding
//! - `sampler`: periodic video/audio capture tasks
//! - `controller`: `SessionController`, `SessionHandle`, shutdown sequence

pub mod controller;
pub mod queue;
pub mod sampler;
#[cfg(test)]
mod tests;

pub use controller::{ExamSubmitter, SessionController, SessionHandle, SessionSummary};
pub use queue::{QueueItem, SignalQueue};
