//! Data models

pub mod attempt;
pub mod protocol;

pub use attempt::*;
pub use protocol::*;
