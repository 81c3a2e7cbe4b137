//! Signal Module
//!
//! Raw samples coming out of the samplers and the classified `Signal`
//! that flows into the Aggregator.
//!
//! ## Structure
//! - `sample`: VideoFrame, AudioBuffer, WindowEvent, InputEvent
//! - `types`: Signal, SignalSource, per-source categories

pub mod sample;
pub mod types;

pub use sample::{
    AudioBuffer,
    InputEvent,
    InputEventKind,
    KeyCombo,
    VideoFrame,
    WindowEvent,
    WindowEventKind,
};

pub use types::{
    AudioCategory,
    InputCategory,
    Signal,
    SignalCategory,
    SignalSource,
    VideoCategory,
    WindowCategory,
};
