//! Classifier Module
//!
//! Maps one raw sample + the calibrated baseline into a `Signal`.
//! Classifiers emit the raw per-sample category unconditionally; deciding
//! whether something persisted long enough to matter is the Aggregator's job.
//!
//! ## Structure
//! - `features`: numeric measurements (brightness, skin map, rms, spectrum)
//! - `video`: camera frame -> person/blocked/disabled categories
//! - `audio`: microphone buffer -> quiet/noise/speech/conversation
//! - `events`: window focus + keyboard/clipboard events
//!
//! ## Usage
//! ```ignore
//! let mut video = VideoClassifier::new(config.classifier.clone());
//! let signal = video.classify(&frame, &baseline)?;
//! ```

pub mod audio;
pub mod events;
pub mod features;
pub mod video;

use crate::logic::baseline::Baseline;
use crate::logic::error::ProctorError;
use crate::logic::signal::Signal;

pub use audio::AudioClassifier;
pub use events::{InputClassifier, WindowClassifier};
pub use video::VideoClassifier;

/// Swappable classification capability.
///
/// Any smoothing state lives in the instance, never in globals.
pub trait Classifier: Send {
    type Sample;

    fn name(&self) -> &'static str;

    fn classify(&mut self, sample: &Self::Sample, baseline: &Baseline)
        -> Result<Signal, ProctorError>;
}
