//! Video Classifier
//!
//! Placeholder heuristic: skin-tone pixel ratio + column segmentation for
//! presence, mean luma for a covered lens. Swappable for a real detector
//! behind the same `Classifier` contract.

use super::features::{self, SkinMap};
use super::Classifier;
use crate::logic::baseline::Baseline;
use crate::logic::config::ClassifierConfig;
use crate::logic::error::ProctorError;
use crate::logic::signal::{Signal, SignalCategory, VideoCategory, VideoFrame};

pub struct VideoClassifier {
    config: ClassifierConfig,
}

impl VideoClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Brightness under which the lens counts as covered, for this room
    fn blocked_threshold(&self, baseline: &Baseline) -> f32 {
        self.config
            .camera_blocked_brightness
            .max(baseline.avg_brightness * self.config.camera_blocked_relative)
    }

    fn presence(&self, frame: &VideoFrame, map: &SkinMap) -> (VideoCategory, f32, usize, f32) {
        let cfg = &self.config;
        let min_width = (frame.width as f32 * cfg.segment_min_width_ratio).ceil() as usize;
        let segments = features::skin_segments(map, cfg.segment_column_density, min_width);

        if map.ratio < cfg.no_person_max_skin_ratio {
            let confidence = 1.0 - 0.5 * (map.ratio / cfg.no_person_max_skin_ratio);
            return (VideoCategory::NoPerson, confidence, segments.len(), 0.0);
        }

        if segments.len() >= 2 {
            let confidence = (0.6 + 0.1 * (segments.len() - 1) as f32).min(0.95);
            return (VideoCategory::MultiplePeople, confidence, segments.len(), 0.0);
        }
        if map.ratio >= cfg.multiple_people_min_skin_ratio {
            return (VideoCategory::MultiplePeople, 0.7, segments.len(), 0.0);
        }

        if let Some(face) = segments.first() {
            let offset = (face.center() - frame.width as f32 / 2.0).abs() / frame.width as f32;
            if offset > cfg.look_away_offset_ratio {
                return (VideoCategory::LookingAway, 0.5 + offset, 1, offset);
            }
            return (VideoCategory::OnePerson, 0.9, 1, offset);
        }

        // Skin present but too scattered to form a face
        (VideoCategory::OnePerson, 0.4, 0, 0.0)
    }
}

impl Classifier for VideoClassifier {
    type Sample = VideoFrame;

    fn name(&self) -> &'static str {
        "video"
    }

    fn classify(&mut self, frame: &VideoFrame, baseline: &Baseline) -> Result<Signal, ProctorError> {
        if !frame.is_well_formed() {
            return Err(ProctorError::ClassificationError(format!(
                "malformed frame {}x{} with {} bytes",
                frame.width,
                frame.height,
                frame.rgb.len()
            )));
        }

        let at = frame.captured_at;
        if !frame.track_enabled {
            return Ok(Signal::new(SignalCategory::Video(VideoCategory::CameraDisabled), 1.0, at));
        }

        let brightness = features::mean_brightness(frame);
        let relative = if baseline.avg_brightness > f32::EPSILON {
            brightness / baseline.avg_brightness
        } else {
            1.0
        };

        let threshold = self.blocked_threshold(baseline);
        if brightness < threshold {
            let confidence = 0.5 + 0.5 * (1.0 - brightness / threshold);
            return Ok(
                Signal::new(SignalCategory::Video(VideoCategory::CameraBlocked), confidence, at)
                    .with_metric("brightness", brightness as f64)
                    .with_metric("relative_brightness", relative as f64),
            );
        }

        let map = features::skin_map(frame);
        let (category, confidence, segments, offset) = self.presence(frame, &map);

        Ok(Signal::new(SignalCategory::Video(category), confidence, at)
            .with_metric("brightness", brightness as f64)
            .with_metric("relative_brightness", relative as f64)
            .with_metric("skin_ratio", map.ratio as f64)
            .with_metric("segments", segments as f64)
            .with_metric("face_offset", offset as f64))
    }
}
