//! Exam Proctoring - Violation Detection & Escalation Engine
//!
//! Library root. The demo binary in `main.rs` drives one simulated attempt.

pub mod constants;
pub mod logic;
