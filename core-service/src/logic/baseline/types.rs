use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// BASELINE SNAPSHOT
// ============================================================================

/// Calibrated room reference. Immutable once calibration completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub avg_brightness: f32,
    pub brightness_variance: f32,
    #[serde(rename = "avgAudioRMS")]
    pub avg_audio_rms: f32,
    pub audio_variance: f32,
    pub video_samples: usize,
    pub audio_samples: usize,
    pub calibrated_at: DateTime<Utc>,
}

impl Baseline {
    /// Neutral baseline: mid-grey room, silent microphone.
    /// Used by tests and by replay tooling that has no calibration data.
    pub fn neutral(calibrated_at: DateTime<Utc>) -> Self {
        Self {
            avg_brightness: 0.5,
            brightness_variance: 0.0,
            avg_audio_rms: 0.0,
            audio_variance: 0.0,
            video_samples: 0,
            audio_samples: 0,
            calibrated_at,
        }
    }

    pub fn audio_std(&self) -> f32 {
        self.audio_variance.max(0.0).sqrt()
    }
}

// ============================================================================
// RUNNING STATISTICS
// ============================================================================

/// Welford mean/variance accumulator
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        let x = value as f64;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f32 {
        self.mean as f32
    }

    /// Population variance
    pub fn variance(&self) -> f32 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / self.count as f64) as f32
        }
    }
}
