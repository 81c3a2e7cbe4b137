//! Ledger Types
//!
//! Violation records and their classification. Data only - the
//! mutation rules live in `aggregator.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VIOLATION TYPES
// ============================================================================

/// Stable violation-type identifiers (wire format is snake_case)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    NoFaceDetected,
    LookingAway,
    MultiplePeople,
    CameraBlocked,
    CameraDisabled,
    SpeechDetected,
    SustainedConversation,
    TabSwitch,
    FullscreenExit,
    CopyPaste,
    ProhibitedShortcut,
    MobileDeviceBlocked,
}

impl ViolationType {
    pub const ALL: [ViolationType; 12] = [
        ViolationType::NoFaceDetected,
        ViolationType::LookingAway,
        ViolationType::MultiplePeople,
        ViolationType::CameraBlocked,
        ViolationType::CameraDisabled,
        ViolationType::SpeechDetected,
        ViolationType::SustainedConversation,
        ViolationType::TabSwitch,
        ViolationType::FullscreenExit,
        ViolationType::CopyPaste,
        ViolationType::ProhibitedShortcut,
        ViolationType::MobileDeviceBlocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::NoFaceDetected => "no_face_detected",
            ViolationType::LookingAway => "looking_away",
            ViolationType::MultiplePeople => "multiple_people",
            ViolationType::CameraBlocked => "camera_blocked",
            ViolationType::CameraDisabled => "camera_disabled",
            ViolationType::SpeechDetected => "speech_detected",
            ViolationType::SustainedConversation => "sustained_conversation",
            ViolationType::TabSwitch => "tab_switch",
            ViolationType::FullscreenExit => "fullscreen_exit",
            ViolationType::CopyPaste => "copy_paste",
            ViolationType::ProhibitedShortcut => "prohibited_shortcut",
            ViolationType::MobileDeviceBlocked => "mobile_device_blocked",
        }
    }

    /// Severity before the critical-type override is applied
    pub fn base_severity(&self) -> Severity {
        match self {
            ViolationType::SpeechDetected | ViolationType::CopyPaste => Severity::Low,
            ViolationType::NoFaceDetected
            | ViolationType::LookingAway
            | ViolationType::TabSwitch
            | ViolationType::FullscreenExit
            | ViolationType::ProhibitedShortcut => Severity::Medium,
            ViolationType::MultiplePeople
            | ViolationType::CameraBlocked
            | ViolationType::CameraDisabled
            | ViolationType::SustainedConversation
            | ViolationType::MobileDeviceBlocked => Severity::High,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ViolationType::NoFaceDetected => "No face detected",
            ViolationType::LookingAway => "Looking away from screen",
            ViolationType::MultiplePeople => "Multiple people in frame",
            ViolationType::CameraBlocked => "Camera view blocked",
            ViolationType::CameraDisabled => "Camera disabled",
            ViolationType::SpeechDetected => "Speech detected",
            ViolationType::SustainedConversation => "Sustained conversation",
            ViolationType::TabSwitch => "Switched away from exam",
            ViolationType::FullscreenExit => "Left fullscreen mode",
            ViolationType::CopyPaste => "Clipboard use",
            ViolationType::ProhibitedShortcut => "Prohibited shortcut",
            ViolationType::MobileDeviceBlocked => "Mobile device not allowed",
        }
    }
}

impl std::fmt::Display for ViolationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ViolationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown violation type '{}'", s))
    }
}

// ============================================================================
// VIOLATION
// ============================================================================

/// Durable, append-only record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Sequence number within the attempt (1-based)
    pub id: u64,
    pub attempt_id: Uuid,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}
