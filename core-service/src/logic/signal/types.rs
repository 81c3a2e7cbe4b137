//! Signal Types
//!
//! One classified observation produced by a Classifier.
//! Ephemeral - consumed exactly once by the Aggregator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Video,
    Audio,
    Window,
    Input,
}

impl SignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Video => "video",
            SignalSource::Audio => "audio",
            SignalSource::Window => "window",
            SignalSource::Input => "input",
        }
    }

    /// Periodic device signals may be shed under backpressure,
    /// discrete user events may not.
    pub fn is_droppable(&self) -> bool {
        matches!(self, SignalSource::Video | SignalSource::Audio)
    }
}

// ============================================================================
// CATEGORIES (per source)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCategory {
    NoPerson,
    OnePerson,
    MultiplePeople,
    LookingAway,
    CameraBlocked,
    CameraDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCategory {
    Quiet,
    Noise,
    SpeechDetected,
    SustainedConversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowCategory {
    TabHidden,
    FocusLost,
    FocusRegained,
    FullscreenExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputCategory {
    Keystroke,
    CopyPaste,
    ProhibitedShortcut,
    ContextMenu,
    MobileDevice,
}

/// Source-specific category. The source is implied by the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "category", rename_all = "snake_case")]
pub enum SignalCategory {
    Video(VideoCategory),
    Audio(AudioCategory),
    Window(WindowCategory),
    Input(InputCategory),
}

impl SignalCategory {
    pub fn source(&self) -> SignalSource {
        match self {
            SignalCategory::Video(_) => SignalSource::Video,
            SignalCategory::Audio(_) => SignalSource::Audio,
            SignalCategory::Window(_) => SignalSource::Window,
            SignalCategory::Input(_) => SignalSource::Input,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Video(c) => match c {
                VideoCategory::NoPerson => "no_person",
                VideoCategory::OnePerson => "one_person",
                VideoCategory::MultiplePeople => "multiple_people",
                VideoCategory::LookingAway => "looking_away",
                VideoCategory::CameraBlocked => "camera_blocked",
                VideoCategory::CameraDisabled => "camera_disabled",
            },
            SignalCategory::Audio(c) => match c {
                AudioCategory::Quiet => "quiet",
                AudioCategory::Noise => "noise",
                AudioCategory::SpeechDetected => "speech_detected",
                AudioCategory::SustainedConversation => "sustained_conversation",
            },
            SignalCategory::Window(c) => match c {
                WindowCategory::TabHidden => "tab_hidden",
                WindowCategory::FocusLost => "focus_lost",
                WindowCategory::FocusRegained => "focus_regained",
                WindowCategory::FullscreenExited => "fullscreen_exited",
            },
            SignalCategory::Input(c) => match c {
                InputCategory::Keystroke => "keystroke",
                InputCategory::CopyPaste => "copy_paste",
                InputCategory::ProhibitedShortcut => "prohibited_shortcut",
                InputCategory::ContextMenu => "context_menu",
                InputCategory::MobileDevice => "mobile_device",
            },
        }
    }
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source().as_str(), self.as_str())
    }
}

// ============================================================================
// SIGNAL
// ============================================================================

/// One classified observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub category: SignalCategory,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Opaque numeric measurements (brightness, rms, ...)
    pub metrics: BTreeMap<String, f64>,
    pub observed_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(category: SignalCategory, confidence: f32, observed_at: DateTime<Utc>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            category,
            confidence,
            metrics: BTreeMap::new(),
            observed_at,
        }
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn source(&self) -> SignalSource {
        self.category.source()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}
