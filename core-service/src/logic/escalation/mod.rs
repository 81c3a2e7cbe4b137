//! Escalation Module
//!
//! Decides whether an attempt continues, is warned, or is terminated.
//! Deterministic: the same ledger and config always give the same decision.
//!
//! ## Structure
//! - `types`: AttemptStatus, Decision, Transition, TerminationReason, directives
//! - `engine`: evaluate / apply_directive / complete
//!
//! ## Usage
//! ```ignore
//! let decision = evaluate(&ledger, &policy, status, &violation);
//! if let Some(transition) = &decision.transition {
//!     sync.send_transition(transition.clone());
//! }
//! ```

pub mod engine;
pub mod types;

pub use types::{
    Attempt,
    AttemptStatus,
    Decision,
    Directive,
    TerminateDirective,
    TerminationReason,
    Transition,
};

pub use engine::{apply_directive, complete, evaluate};
