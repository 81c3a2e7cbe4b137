//! Trigger Rules
//!
//! Which signal category feeds which violation type, and how long it has
//! to persist first. Plus the per-type debounce state the Aggregator keeps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::types::ViolationType;
use super::window::{span_seconds, SlidingWindow};
use crate::logic::config::PolicyConfig;
use crate::logic::signal::{
    AudioCategory, InputCategory, SignalCategory, SignalSource, VideoCategory, WindowCategory,
};

// ============================================================================
// RULES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRule {
    /// First qualifying signal
    Immediate,
    /// N qualifying signals in a row from the same source
    Consecutive(u32),
    /// Qualifying signals spanning at least this many seconds
    Sustained(u64),
    /// N occurrences inside a rolling window of `window_secs`
    Rate { count: u32, window_secs: u64 },
}

/// Violation type a category feeds, if any
pub fn violation_for(category: SignalCategory) -> Option<ViolationType> {
    match category {
        SignalCategory::Video(c) => match c {
            VideoCategory::NoPerson => Some(ViolationType::NoFaceDetected),
            VideoCategory::LookingAway => Some(ViolationType::LookingAway),
            VideoCategory::MultiplePeople => Some(ViolationType::MultiplePeople),
            VideoCategory::CameraBlocked => Some(ViolationType::CameraBlocked),
            VideoCategory::CameraDisabled => Some(ViolationType::CameraDisabled),
            VideoCategory::OnePerson => None,
        },
        SignalCategory::Audio(c) => match c {
            AudioCategory::SpeechDetected => Some(ViolationType::SpeechDetected),
            AudioCategory::SustainedConversation => Some(ViolationType::SustainedConversation),
            AudioCategory::Quiet | AudioCategory::Noise => None,
        },
        SignalCategory::Window(c) => match c {
            WindowCategory::TabHidden | WindowCategory::FocusLost => Some(ViolationType::TabSwitch),
            WindowCategory::FullscreenExited => Some(ViolationType::FullscreenExit),
            WindowCategory::FocusRegained => None,
        },
        SignalCategory::Input(c) => match c {
            InputCategory::CopyPaste => Some(ViolationType::CopyPaste),
            InputCategory::ProhibitedShortcut => Some(ViolationType::ProhibitedShortcut),
            InputCategory::MobileDevice => Some(ViolationType::MobileDeviceBlocked),
            InputCategory::Keystroke | InputCategory::ContextMenu => None,
        },
    }
}

/// Source whose signals feed a violation type
pub fn source_of(t: ViolationType) -> SignalSource {
    match t {
        ViolationType::NoFaceDetected
        | ViolationType::LookingAway
        | ViolationType::MultiplePeople
        | ViolationType::CameraBlocked
        | ViolationType::CameraDisabled => SignalSource::Video,
        ViolationType::SpeechDetected | ViolationType::SustainedConversation => SignalSource::Audio,
        ViolationType::TabSwitch | ViolationType::FullscreenExit => SignalSource::Window,
        ViolationType::CopyPaste
        | ViolationType::ProhibitedShortcut
        | ViolationType::MobileDeviceBlocked => SignalSource::Input,
    }
}

pub fn trigger_rule(t: ViolationType, policy: &PolicyConfig) -> TriggerRule {
    match t {
        ViolationType::NoFaceDetected => TriggerRule::Consecutive(policy.max_no_face_samples),
        ViolationType::LookingAway => TriggerRule::Sustained(policy.max_look_away_seconds),
        ViolationType::MultiplePeople => TriggerRule::Consecutive(policy.max_multiple_people_samples),
        ViolationType::CameraBlocked => TriggerRule::Consecutive(policy.max_camera_hidden_samples),
        ViolationType::SpeechDetected => TriggerRule::Consecutive(policy.max_speech_samples),
        ViolationType::TabSwitch => TriggerRule::Rate {
            count: policy.max_tab_switches,
            window_secs: policy.tab_switch_window_seconds,
        },
        ViolationType::CameraDisabled
        | ViolationType::SustainedConversation
        | ViolationType::FullscreenExit
        | ViolationType::CopyPaste
        | ViolationType::ProhibitedShortcut
        | ViolationType::MobileDeviceBlocked => TriggerRule::Immediate,
    }
}

// ============================================================================
// DEBOUNCE STATE
// ============================================================================

#[derive(Debug, Clone)]
enum RuleState {
    Count(u32),
    Since(Option<DateTime<Utc>>),
    Window(SlidingWindow),
    Stateless,
}

/// Per-type debounce bookkeeping for one attempt
#[derive(Debug, Clone)]
pub struct Debounce {
    rules: HashMap<ViolationType, (TriggerRule, RuleState)>,
    /// Focus currently away from the exam; a hide + blur pair is one departure
    away: bool,
}

impl Debounce {
    pub fn new(policy: &PolicyConfig) -> Self {
        let rules = ViolationType::ALL
            .iter()
            .map(|t| {
                let rule = trigger_rule(*t, policy);
                let state = match rule {
                    TriggerRule::Immediate => RuleState::Stateless,
                    TriggerRule::Consecutive(_) => RuleState::Count(0),
                    TriggerRule::Sustained(_) => RuleState::Since(None),
                    TriggerRule::Rate { window_secs, .. } => {
                        RuleState::Window(SlidingWindow::new(window_secs))
                    }
                };
                (*t, (rule, state))
            })
            .collect();
        Self { rules, away: false }
    }

    /// Feed one signal. Returns the violation type when its rule fires.
    pub fn observe(&mut self, category: SignalCategory, at: DateTime<Utc>) -> Option<ViolationType> {
        let target = violation_for(category);
        self.reset_siblings(category.source(), target);

        if category == SignalCategory::Window(WindowCategory::FocusRegained) {
            self.away = false;
            return None;
        }

        let t = target?;
        if t == ViolationType::TabSwitch {
            if self.away {
                return None;
            }
            self.away = true;
        }

        let (rule, state) = self.rules.get_mut(&t)?;
        let fired = match (rule, state) {
            (TriggerRule::Immediate, _) => true,
            (TriggerRule::Consecutive(n), RuleState::Count(count)) => {
                *count += 1;
                *count >= *n
            }
            (TriggerRule::Sustained(secs), RuleState::Since(start)) => {
                let since = *start.get_or_insert(at);
                at - since >= span_seconds(*secs)
            }
            (TriggerRule::Rate { count, .. }, RuleState::Window(window)) => {
                window.push(at) >= *count as usize
            }
            _ => false,
        };

        if fired {
            self.reset(t);
            Some(t)
        } else {
            None
        }
    }

    /// Reset consecutive/sustained state of the other rules of `source`
    fn reset_siblings(&mut self, source: SignalSource, keep: Option<ViolationType>) {
        for (t, (_, state)) in self.rules.iter_mut() {
            if Some(*t) == keep || source_of(*t) != source {
                continue;
            }
            match state {
                RuleState::Count(c) => *c = 0,
                RuleState::Since(s) => *s = None,
                RuleState::Window(_) | RuleState::Stateless => {}
            }
        }
    }

    fn reset(&mut self, t: ViolationType) {
        if let Some((_, state)) = self.rules.get_mut(&t) {
            match state {
                RuleState::Count(c) => *c = 0,
                RuleState::Since(s) => *s = None,
                RuleState::Window(w) => w.clear(),
                RuleState::Stateless => {}
            }
        }
    }

    /// Current consecutive count for a type (0 for non-counting rules)
    pub fn pending(&self, t: ViolationType) -> u32 {
        match self.rules.get(&t) {
            Some((_, RuleState::Count(c))) => *c,
            Some((_, RuleState::Window(w))) => w.len() as u32,
            Some((_, RuleState::Since(Some(_)))) => 1,
            _ => 0,
        }
    }
}
