//! Proctoring Configuration
//!
//! Every threshold the engine uses. Loaded from a JSON file (camelCase keys),
//! then optionally overridden from `PROCTOR_*` environment variables.
//! Missing keys fall back to the documented defaults below.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::error::ProctorError;
use crate::logic::ledger::ViolationType;

// ============================================================================
// POLICY CONFIG
// ============================================================================

/// Longest time span any policy window may cover (one day)
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Debounce and escalation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    /// `looking_away` must persist this long before it becomes a violation
    pub max_look_away_seconds: u64,
    /// Consecutive `no_person` samples before `no_face_detected`
    pub max_no_face_samples: u32,
    pub max_multiple_people_samples: u32,
    pub max_camera_hidden_samples: u32,
    /// Consecutive `speech_detected` samples before `speech_detected`
    pub max_speech_samples: u32,
    /// Tab/focus switches within `tab_switch_window_seconds` before `tab_switch`
    pub max_tab_switches: u32,
    pub tab_switch_window_seconds: u64,
    /// Total violations (any severity) that terminate
    pub terminate_on_violation_count: u32,
    /// high + critical violations that terminate; unset means
    /// `terminate_on_violation_count`
    pub terminate_on_severe_count: Option<u32>,
    pub warn_on_high_severity_count: u32,
    pub warn_on_soft_violation_count: u32,
    pub soft_violation_types: BTreeSet<ViolationType>,
    pub rate_window_seconds: u64,
    pub rate_window_max_violations: u32,
    /// Zero-tolerance types, always recorded as `critical`
    pub critical_violation_types: BTreeSet<ViolationType>,
    /// Signals below this confidence neither advance nor reset debounce
    pub min_signal_confidence: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_look_away_seconds: 10,
            max_no_face_samples: 5,
            max_multiple_people_samples: 3,
            max_camera_hidden_samples: 3,
            max_speech_samples: 6,
            max_tab_switches: 3,
            tab_switch_window_seconds: 120,
            terminate_on_violation_count: 7,
            terminate_on_severe_count: None,
            warn_on_high_severity_count: 2,
            warn_on_soft_violation_count: 2,
            soft_violation_types: [
                ViolationType::TabSwitch,
                ViolationType::FullscreenExit,
                ViolationType::CopyPaste,
                ViolationType::ProhibitedShortcut,
            ]
            .into_iter()
            .collect(),
            rate_window_seconds: 120,
            rate_window_max_violations: 4,
            critical_violation_types: [
                ViolationType::SustainedConversation,
                ViolationType::CameraDisabled,
                ViolationType::MobileDeviceBlocked,
            ]
            .into_iter()
            .collect(),
            min_signal_confidence: 0.5,
        }
    }
}

impl PolicyConfig {
    /// High-stakes exams: terminate early
    pub fn strict() -> Self {
        Self {
            max_tab_switches: 2,
            terminate_on_violation_count: 3,
            terminate_on_severe_count: Some(2),
            warn_on_high_severity_count: 1,
            warn_on_soft_violation_count: 1,
            critical_violation_types: [
                ViolationType::SustainedConversation,
                ViolationType::CameraDisabled,
                ViolationType::MobileDeviceBlocked,
                ViolationType::MultiplePeople,
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    /// Practice quizzes: warn a lot, terminate rarely
    pub fn lenient() -> Self {
        Self {
            max_tab_switches: 5,
            terminate_on_violation_count: 12,
            terminate_on_severe_count: Some(8),
            warn_on_high_severity_count: 3,
            warn_on_soft_violation_count: 4,
            rate_window_max_violations: 8,
            critical_violation_types: [ViolationType::SustainedConversation]
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }

    pub fn is_critical(&self, t: ViolationType) -> bool {
        self.critical_violation_types.contains(&t)
    }

    pub fn is_soft(&self, t: ViolationType) -> bool {
        self.soft_violation_types.contains(&t)
    }

    /// high + critical count that terminates
    pub fn severe_limit(&self) -> u32 {
        self.terminate_on_severe_count
            .unwrap_or(self.terminate_on_violation_count)
    }

    fn validate(&self) -> Result<(), ProctorError> {
        let counts = [
            ("maxNoFaceSamples", self.max_no_face_samples),
            ("maxMultiplePeopleSamples", self.max_multiple_people_samples),
            ("maxCameraHiddenSamples", self.max_camera_hidden_samples),
            ("maxSpeechSamples", self.max_speech_samples),
            ("maxTabSwitches", self.max_tab_switches),
            ("terminateOnViolationCount", self.terminate_on_violation_count),
            ("terminateOnSevereCount", self.severe_limit()),
            ("warnOnHighSeverityCount", self.warn_on_high_severity_count),
            ("warnOnSoftViolationCount", self.warn_on_soft_violation_count),
            ("rateWindowMaxViolations", self.rate_window_max_violations),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ProctorError::Config(format!("{} must be at least 1", name)));
            }
        }
        let spans = [
            ("maxLookAwaySeconds", self.max_look_away_seconds),
            ("tabSwitchWindowSeconds", self.tab_switch_window_seconds),
            ("rateWindowSeconds", self.rate_window_seconds),
        ];
        for (name, secs) in spans {
            if secs == 0 || secs > MAX_WINDOW_SECONDS {
                return Err(ProctorError::Config(format!(
                    "{} must be in 1..={}",
                    name, MAX_WINDOW_SECONDS
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.min_signal_confidence) {
            return Err(ProctorError::Config(format!(
                "minSignalConfidence {} outside [0, 1]",
                self.min_signal_confidence
            )));
        }
        Ok(())
    }
}

// ============================================================================
// CLASSIFIER CONFIG
// ============================================================================

/// Heuristic thresholds for the placeholder classifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Mean luma (0-1) under which the camera counts as covered
    pub camera_blocked_brightness: f32,
    /// Relative to the calibrated room brightness
    pub camera_blocked_relative: f32,
    pub no_person_max_skin_ratio: f32,
    pub multiple_people_min_skin_ratio: f32,
    /// Fraction of a column's pixels that must be skin for the column to count
    pub segment_column_density: f32,
    /// Minimum segment width as a fraction of frame width
    pub segment_min_width_ratio: f32,
    /// Face centre offset from frame centre (fraction of width)
    pub look_away_offset_ratio: f32,
    pub speech_sigma_k: f32,
    pub min_speech_rms: f32,
    pub noise_rms: f32,
    pub voice_centroid_min_hz: f32,
    pub voice_centroid_max_hz: f32,
    pub voice_rolloff_max_hz: f32,
    pub speech_window_size: usize,
    pub speech_density_threshold: usize,
    pub max_spectrum_samples: usize,
    /// Normalized key combos, e.g. "ctrl+shift+i"
    pub blocked_shortcuts: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            camera_blocked_brightness: 0.06,
            camera_blocked_relative: 0.2,
            no_person_max_skin_ratio: 0.02,
            multiple_people_min_skin_ratio: 0.45,
            segment_column_density: 0.1,
            segment_min_width_ratio: 0.05,
            look_away_offset_ratio: 0.3,
            speech_sigma_k: 3.0,
            min_speech_rms: 0.02,
            noise_rms: 0.05,
            voice_centroid_min_hz: 150.0,
            voice_centroid_max_hz: 3500.0,
            voice_rolloff_max_hz: 5000.0,
            speech_window_size: 10,
            speech_density_threshold: 8,
            max_spectrum_samples: 512,
            blocked_shortcuts: [
                "f12",
                "ctrl+shift+i",
                "ctrl+shift+j",
                "ctrl+shift+c",
                "ctrl+u",
                "ctrl+p",
                "ctrl+s",
                "alt+tab",
                "meta+tab",
                "printscreen",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ============================================================================
// CALIBRATION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub duration_ms: u64,
    pub sample_interval_ms: u64,
    pub min_video_samples: usize,
    pub min_audio_samples: usize,
    pub device_timeout_ms: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 8_000,
            sample_interval_ms: 250,
            min_video_samples: 3,
            min_audio_samples: 8,
            device_timeout_ms: 2_000,
        }
    }
}

// ============================================================================
// SYNC CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub enabled: bool,
    pub server_url: String,
    pub sync_retry_backoff_ms: u64,
    pub sync_max_backoff_ms: u64,
    pub sync_buffer_capacity: usize,
    pub request_timeout_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub flush_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: constants::DEFAULT_AUTHORITY_URL.to_string(),
            sync_retry_backoff_ms: 500,
            sync_max_backoff_ms: 30_000,
            sync_buffer_capacity: 256,
            request_timeout_ms: 5_000,
            heartbeat_interval_secs: constants::DEFAULT_HEARTBEAT_INTERVAL,
            flush_timeout_ms: 3_000,
        }
    }
}

// ============================================================================
// SESSION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub video_interval_ms: u64,
    pub audio_interval_ms: u64,
    pub signal_queue_capacity: usize,
    pub device_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    /// `None` disables the local journal
    pub journal_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            video_interval_ms: 2_000,
            audio_interval_ms: 250,
            signal_queue_capacity: 256,
            device_timeout_ms: 3_000,
            stop_timeout_ms: 5_000,
            journal_dir: None,
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProctorConfig {
    pub policy: PolicyConfig,
    pub classifier: ClassifierConfig,
    pub calibration: CalibrationConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
}

impl ProctorConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self, ProctorError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ProctorConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        log::info!("Loaded proctoring config from {:?}", path);
        Ok(config)
    }

    /// Override selected values from `PROCTOR_*` environment variables
    pub fn apply_env(mut self) -> Self {
        let p = &mut self.policy;
        if let Some(v) = constants::env_parse("PROCTOR_MAX_TAB_SWITCHES") {
            p.max_tab_switches = v;
        }
        if let Some(v) = constants::env_parse("PROCTOR_TERMINATE_ON_VIOLATION_COUNT") {
            p.terminate_on_violation_count = v;
        }
        if let Some(v) = constants::env_parse("PROCTOR_WARN_ON_HIGH_SEVERITY_COUNT") {
            p.warn_on_high_severity_count = v;
        }
        if let Some(v) = constants::env_parse("PROCTOR_RATE_WINDOW_SECONDS") {
            p.rate_window_seconds = v;
        }
        if let Some(v) = constants::env_parse("PROCTOR_RATE_WINDOW_MAX_VIOLATIONS") {
            p.rate_window_max_violations = v;
        }

        if std::env::var("PROCTOR_SERVER_URL").is_ok() {
            self.sync.server_url = constants::get_authority_url();
        }
        self.sync.enabled = self.sync.enabled && constants::is_sync_enabled();
        if let Some(v) = constants::env_parse("PROCTOR_SYNC_RETRY_BACKOFF_MS") {
            self.sync.sync_retry_backoff_ms = v;
        }
        if let Some(v) = constants::env_parse("PROCTOR_SYNC_BUFFER_CAPACITY") {
            self.sync.sync_buffer_capacity = v;
        }
        if let Some(v) = constants::env_parse::<PathBuf>("PROCTOR_JOURNAL_DIR") {
            self.session.journal_dir = Some(v);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ProctorError> {
        self.policy.validate()?;

        let c = &self.classifier;
        if c.speech_density_threshold == 0 || c.speech_density_threshold > c.speech_window_size {
            return Err(ProctorError::Config(format!(
                "speechDensityThreshold {} must be in 1..={}",
                c.speech_density_threshold, c.speech_window_size
            )));
        }
        if c.voice_centroid_min_hz >= c.voice_centroid_max_hz {
            return Err(ProctorError::Config("voice centroid band is empty".to_string()));
        }
        if self.sync.sync_buffer_capacity == 0 {
            return Err(ProctorError::Config("syncBufferCapacity must be at least 1".to_string()));
        }
        if self.session.signal_queue_capacity == 0 {
            return Err(ProctorError::Config(
                "signalQueueCapacity must be at least 1".to_string(),
            ));
        }
        if self.calibration.sample_interval_ms == 0 {
            return Err(ProctorError::Config(
                "calibration sampleIntervalMs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProctorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.policy.is_critical(ViolationType::SustainedConversation));
        assert!(!config.policy.is_critical(ViolationType::TabSwitch));
        assert!(config.policy.is_soft(ViolationType::TabSwitch));
    }

    #[test]
    fn test_presets_are_valid() {
        for policy in [PolicyConfig::strict(), PolicyConfig::lenient()] {
            let config = ProctorConfig {
                policy,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
        assert!(PolicyConfig::strict().terminate_on_violation_count
            < PolicyConfig::lenient().terminate_on_violation_count);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "policy": {
                "terminateOnViolationCount": 3,
                "criticalViolationTypes": ["tab_switch"]
            },
            "sync": { "syncBufferCapacity": 16 }
        }"#;
        let config: ProctorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.policy.terminate_on_violation_count, 3);
        assert!(config.policy.is_critical(ViolationType::TabSwitch));
        assert_eq!(config.policy.max_no_face_samples, 5);
        assert_eq!(config.sync.sync_buffer_capacity, 16);
        assert_eq!(config.session.video_interval_ms, 2_000);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = ProctorConfig::default();
        config.policy.max_tab_switches = 0;
        match config.validate() {
            Err(ProctorError::Config(msg)) => assert!(msg.contains("maxTabSwitches")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_look_away_rejected() {
        let config: ProctorConfig =
            serde_json::from_str(r#"{"policy": {"maxLookAwaySeconds": 0}}"#).unwrap();
        match config.validate() {
            Err(ProctorError::Config(msg)) => assert!(msg.contains("maxLookAwaySeconds")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let config: ProctorConfig =
            serde_json::from_str(r#"{"policy": {"rateWindowSeconds": 10000000000000000}}"#).unwrap();
        assert!(matches!(config.validate(), Err(ProctorError::Config(_))));

        let mut config = ProctorConfig::default();
        config.policy.tab_switch_window_seconds = MAX_WINDOW_SECONDS + 1;
        assert!(config.validate().is_err());
        config.policy.tab_switch_window_seconds = MAX_WINDOW_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_severe_limit_falls_back_to_violation_count() {
        let config: ProctorConfig =
            serde_json::from_str(r#"{"policy": {"terminateOnViolationCount": 9}}"#).unwrap();
        assert_eq!(config.policy.terminate_on_severe_count, None);
        assert_eq!(config.policy.severe_limit(), 9);

        let config: ProctorConfig = serde_json::from_str(
            r#"{"policy": {"terminateOnViolationCount": 9, "terminateOnSevereCount": 4}}"#,
        )
        .unwrap();
        assert_eq!(config.policy.severe_limit(), 4);

        let mut config = ProctorConfig::default();
        config.policy.terminate_on_severe_count = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.json");
        std::fs::write(&path, r#"{"policy": {"rateWindowSeconds": 60}}"#).unwrap();

        let config = ProctorConfig::load(&path).unwrap();
        assert_eq!(config.policy.rate_window_seconds, 60);

        std::fs::write(&path, r#"{"policy": {"rateWindowSeconds": 0}}"#).unwrap();
        assert!(ProctorConfig::load(&path).is_err());
    }
}
