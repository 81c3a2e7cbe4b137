//! Baseline Module - Room Calibration
//!
//! Runs once per attempt before monitoring starts. Samples camera and
//! microphone for a fixed window and records the room's ambient brightness
//! and noise level, which the classifiers use to normalise their thresholds.
//!
//! # Failure Strategy
//! Too few usable samples (device missing, permission refused) -> the
//! calibration fails and the session must not start.

pub mod types;
#[cfg(test)]
mod tests;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::logic::classifier::features;
use crate::logic::config::CalibrationConfig;
use crate::logic::device::{capture_with_timeout, DeviceProvider};
use crate::logic::error::ProctorError;
use crate::logic::signal::{AudioBuffer, VideoFrame};

pub use types::{Baseline, RunningStats};

// ============================================================================
// CALIBRATOR (pure accumulation)
// ============================================================================

/// Accumulates calibration samples; `finish` turns them into a `Baseline`
#[derive(Debug, Default)]
pub struct Calibrator {
    brightness: RunningStats,
    audio_rms: RunningStats,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self, frame: &VideoFrame) -> Result<(), ProctorError> {
        if !frame.is_well_formed() {
            return Err(ProctorError::ClassificationError(format!(
                "malformed calibration frame {}x{} ({} bytes)",
                frame.width,
                frame.height,
                frame.rgb.len()
            )));
        }
        if !frame.track_enabled {
            return Err(ProctorError::DeviceUnavailable(
                "camera track disabled during calibration".to_string(),
            ));
        }
        self.brightness.push(features::mean_brightness(frame));
        Ok(())
    }

    pub fn add_audio(&mut self, buffer: &AudioBuffer) -> Result<(), ProctorError> {
        if buffer.samples.is_empty() || buffer.sample_rate == 0 {
            return Err(ProctorError::ClassificationError(
                "empty calibration audio buffer".to_string(),
            ));
        }
        self.audio_rms.push(features::rms(&buffer.samples));
        Ok(())
    }

    pub fn video_samples(&self) -> usize {
        self.brightness.count()
    }

    pub fn audio_samples(&self) -> usize {
        self.audio_rms.count()
    }

    pub fn finish(
        self,
        config: &CalibrationConfig,
        calibrated_at: DateTime<Utc>,
    ) -> Result<Baseline, ProctorError> {
        if self.video_samples() < config.min_video_samples {
            return Err(ProctorError::CalibrationFailed(Box::new(
                ProctorError::DeviceUnavailable(format!(
                    "camera produced {} of {} required samples",
                    self.video_samples(),
                    config.min_video_samples
                )),
            )));
        }
        if self.audio_samples() < config.min_audio_samples {
            return Err(ProctorError::CalibrationFailed(Box::new(
                ProctorError::DeviceUnavailable(format!(
                    "microphone produced {} of {} required samples",
                    self.audio_samples(),
                    config.min_audio_samples
                )),
            )));
        }

        Ok(Baseline {
            avg_brightness: self.brightness.mean(),
            brightness_variance: self.brightness.variance(),
            avg_audio_rms: self.audio_rms.mean(),
            audio_variance: self.audio_rms.variance(),
            video_samples: self.brightness.count(),
            audio_samples: self.audio_rms.count(),
            calibrated_at,
        })
    }
}

// ============================================================================
// CALIBRATION RUN (device driven)
// ============================================================================

/// Sample both devices for `config.duration_ms` and build the baseline.
///
/// `PermissionDenied` aborts immediately. A device that times out or fails
/// is dropped for the rest of the run; the sample-count check at the end
/// decides whether that was fatal.
pub async fn calibrate(
    devices: &dyn DeviceProvider,
    config: &CalibrationConfig,
) -> Result<Baseline, ProctorError> {
    let mut video = Some(
        devices
            .open_video()
            .map_err(|e| ProctorError::CalibrationFailed(Box::new(e)))?,
    );
    let mut audio = Some(
        devices
            .open_audio()
            .map_err(|e| ProctorError::CalibrationFailed(Box::new(e)))?,
    );

    log::info!(
        "[Calibration] Sampling room for {}ms (every {}ms)",
        config.duration_ms,
        config.sample_interval_ms
    );

    let timeout = Duration::from_millis(config.device_timeout_ms);
    let deadline = tokio::time::Instant::now() + Duration::from_millis(config.duration_ms);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.sample_interval_ms));
    let mut calibrator = Calibrator::new();

    loop {
        ticker.tick().await;
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        if video.is_none() && audio.is_none() {
            break;
        }

        if let Some(source) = video.take() {
            let (back, result) = capture_with_timeout(source, timeout).await;
            video = back;
            match result.and_then(|frame| calibrator.add_frame(&frame)) {
                Ok(()) => {}
                Err(e @ ProctorError::PermissionDenied(_)) => {
                    return Err(ProctorError::CalibrationFailed(Box::new(e)));
                }
                Err(ProctorError::DeviceUnavailable(msg)) => {
                    log::warn!("[Calibration] Camera unavailable: {}", msg);
                    video = None;
                }
                Err(e) => log::debug!("[Calibration] Skipped frame: {}", e),
            }
        }

        if let Some(source) = audio.take() {
            let (back, result) = capture_with_timeout(source, timeout).await;
            audio = back;
            match result.and_then(|buffer| calibrator.add_audio(&buffer)) {
                Ok(()) => {}
                Err(e @ ProctorError::PermissionDenied(_)) => {
                    return Err(ProctorError::CalibrationFailed(Box::new(e)));
                }
                Err(ProctorError::DeviceUnavailable(msg)) => {
                    log::warn!("[Calibration] Microphone unavailable: {}", msg);
                    audio = None;
                }
                Err(e) => log::debug!("[Calibration] Skipped audio buffer: {}", e),
            }
        }
    }

    let baseline = calibrator.finish(config, Utc::now())?;
    log::info!(
        "[Calibration] Done: brightness {:.3} (var {:.4}), rms {:.4} (var {:.6}), {} frames / {} buffers",
        baseline.avg_brightness,
        baseline.brightness_variance,
        baseline.avg_audio_rms,
        baseline.audio_variance,
        baseline.video_samples,
        baseline.audio_samples
    );
    Ok(baseline)
}
