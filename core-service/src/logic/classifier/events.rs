//! Window & Input Classifiers
//!
//! Discrete browser-side events. Mapping is 1:1 with full confidence;
//! the baseline plays no part.

use std::collections::HashSet;

use super::Classifier;
use crate::logic::baseline::Baseline;
use crate::logic::config::ClassifierConfig;
use crate::logic::error::ProctorError;
use crate::logic::signal::{
    InputCategory, InputEvent, InputEventKind, Signal, SignalCategory, WindowCategory,
    WindowEvent, WindowEventKind,
};

// ============================================================================
// WINDOW
// ============================================================================

#[derive(Debug, Default)]
pub struct WindowClassifier;

impl WindowClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for WindowClassifier {
    type Sample = WindowEvent;

    fn name(&self) -> &'static str {
        "window"
    }

    fn classify(&mut self, event: &WindowEvent, _baseline: &Baseline) -> Result<Signal, ProctorError> {
        let category = match event.kind {
            WindowEventKind::VisibilityHidden => WindowCategory::TabHidden,
            WindowEventKind::Blur => WindowCategory::FocusLost,
            WindowEventKind::VisibilityVisible | WindowEventKind::Focus => {
                WindowCategory::FocusRegained
            }
            WindowEventKind::FullscreenExit => WindowCategory::FullscreenExited,
        };
        Ok(Signal::new(SignalCategory::Window(category), 1.0, event.at))
    }
}

// ============================================================================
// INPUT
// ============================================================================

/// Clipboard keyboard shortcuts, counted as clipboard use
const CLIPBOARD_COMBOS: [&str; 6] = ["ctrl+c", "ctrl+v", "ctrl+x", "meta+c", "meta+v", "meta+x"];

pub struct InputClassifier {
    blocked: HashSet<String>,
}

impl InputClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            blocked: config
                .blocked_shortcuts
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
        }
    }
}

impl Classifier for InputClassifier {
    type Sample = InputEvent;

    fn name(&self) -> &'static str {
        "input"
    }

    fn classify(&mut self, event: &InputEvent, _baseline: &Baseline) -> Result<Signal, ProctorError> {
        let mut metrics = Vec::new();
        let category = match &event.kind {
            InputEventKind::Copy | InputEventKind::Cut | InputEventKind::Paste => {
                InputCategory::CopyPaste
            }
            InputEventKind::ContextMenu => InputCategory::ContextMenu,
            InputEventKind::MobileDevice { user_agent } => {
                log::debug!("[Input] Mobile device reported: {}", user_agent);
                InputCategory::MobileDevice
            }
            InputEventKind::Key(combo) => {
                if combo.key.trim().is_empty() {
                    return Err(ProctorError::ClassificationError(
                        "key event without a key".to_string(),
                    ));
                }
                let normalized = combo.normalized();
                let modifiers = [combo.ctrl, combo.alt, combo.shift, combo.meta]
                    .iter()
                    .filter(|m| **m)
                    .count();
                metrics.push(("modifiers", modifiers as f64));
                if self.blocked.contains(&normalized) {
                    InputCategory::ProhibitedShortcut
                } else if CLIPBOARD_COMBOS.contains(&normalized.as_str()) {
                    InputCategory::CopyPaste
                } else {
                    InputCategory::Keystroke
                }
            }
        };

        let mut signal = Signal::new(SignalCategory::Input(category), 1.0, event.at);
        for (name, value) in metrics {
            signal = signal.with_metric(name, value);
        }
        Ok(signal)
    }
}
