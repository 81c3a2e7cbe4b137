//! Raw Samples
//!
//! What the samplers hand to the classifiers. No interpretation here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// VIDEO
// ============================================================================

/// One camera frame, packed RGB8
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// False when the user or OS has disabled the camera track
    pub track_enabled: bool,
    pub captured_at: DateTime<Utc>,
}

impl VideoFrame {
    /// Frame filled with one colour
    pub fn filled(width: u32, height: u32, color: [u8; 3], captured_at: DateTime<Utc>) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(pixels * 3);
        for _ in 0..pixels {
            rgb.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            rgb,
            track_enabled: true,
            captured_at,
        }
    }

    /// Paint a rectangle in place (clipped to the frame)
    pub fn paint_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y..y_end {
            for col in x..x_end {
                let idx = ((row * self.width + col) * 3) as usize;
                self.rgb[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn is_well_formed(&self) -> bool {
        self.pixel_count() > 0 && self.rgb.len() == self.pixel_count() * 3
    }
}

// ============================================================================
// AUDIO
// ============================================================================

/// One microphone buffer, mono PCM in [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub captured_at: DateTime<Utc>,
}

impl AudioBuffer {
    pub fn silence(len: usize, sample_rate: u32, captured_at: DateTime<Utc>) -> Self {
        Self {
            samples: vec![0.0; len],
            sample_rate,
            captured_at,
        }
    }

    /// Pure sine tone
    pub fn tone(
        freq_hz: f32,
        amplitude: f32,
        len: usize,
        sample_rate: u32,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let step = 2.0 * std::f32::consts::PI * freq_hz / sample_rate as f32;
        let samples = (0..len).map(|i| amplitude * (step * i as f32).sin()).collect();
        Self {
            samples,
            sample_rate,
            captured_at,
        }
    }
}

// ============================================================================
// WINDOW / INPUT EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowEventKind {
    VisibilityHidden,
    VisibilityVisible,
    Blur,
    Focus,
    FullscreenExit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub kind: WindowEventKind,
    pub at: DateTime<Utc>,
}

/// Key press with modifiers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Default::default()
        }
    }

    /// Canonical form, e.g. "ctrl+shift+i"
    pub fn normalized(&self) -> String {
        let mut parts = Vec::with_capacity(5);
        if self.ctrl {
            parts.push("ctrl".to_string());
        }
        if self.alt {
            parts.push("alt".to_string());
        }
        if self.shift {
            parts.push("shift".to_string());
        }
        if self.meta {
            parts.push("meta".to_string());
        }
        parts.push(self.key.to_lowercase());
        parts.join("+")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEventKind {
    Copy,
    Cut,
    Paste,
    ContextMenu,
    Key(KeyCombo),
    MobileDevice { user_agent: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub at: DateTime<Utc>,
}
