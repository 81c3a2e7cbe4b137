//! Audio Classifier
//!
//! RMS + spectral centroid + spectral rolloff per buffer, compared against the
//! calibrated room noise. A short rolling window of speech flags turns
//! repeated speech into `sustained_conversation`.

use std::collections::VecDeque;

use super::features;
use super::Classifier;
use crate::logic::baseline::Baseline;
use crate::logic::config::ClassifierConfig;
use crate::logic::error::ProctorError;
use crate::logic::signal::{AudioBuffer, AudioCategory, Signal, SignalCategory};

/// Energy fraction for the rolloff frequency
const ROLLOFF_FRACTION: f32 = 0.85;

pub struct AudioClassifier {
    config: ClassifierConfig,
    recent_speech: VecDeque<bool>,
}

impl AudioClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let capacity = config.speech_window_size;
        Self {
            config,
            recent_speech: VecDeque::with_capacity(capacity),
        }
    }

    /// RMS a buffer must exceed to count as speech in this room
    fn speech_threshold(&self, baseline: &Baseline) -> f32 {
        let adaptive = baseline.avg_audio_rms + self.config.speech_sigma_k * baseline.audio_std();
        adaptive.max(self.config.min_speech_rms)
    }

    fn remember(&mut self, speech: bool) -> usize {
        self.recent_speech.push_back(speech);
        while self.recent_speech.len() > self.config.speech_window_size {
            self.recent_speech.pop_front();
        }
        self.recent_speech.iter().filter(|s| **s).count()
    }

    /// Speech flags currently in the rolling window
    pub fn speech_density(&self) -> usize {
        self.recent_speech.iter().filter(|s| **s).count()
    }
}

impl Classifier for AudioClassifier {
    type Sample = AudioBuffer;

    fn name(&self) -> &'static str {
        "audio"
    }

    fn classify(&mut self, buffer: &AudioBuffer, baseline: &Baseline) -> Result<Signal, ProctorError> {
        if buffer.samples.is_empty() || buffer.sample_rate == 0 {
            return Err(ProctorError::ClassificationError(
                "empty audio buffer".to_string(),
            ));
        }
        if buffer.samples.iter().any(|s| !s.is_finite()) {
            return Err(ProctorError::ClassificationError(
                "audio buffer contains non-finite samples".to_string(),
            ));
        }

        let cfg = &self.config;
        let rms = features::rms(&buffer.samples);
        let spectrum = features::magnitude_spectrum(&buffer.samples, cfg.max_spectrum_samples);
        let centroid = features::spectral_centroid(&spectrum, buffer.sample_rate);
        let rolloff = features::spectral_rolloff(&spectrum, buffer.sample_rate, ROLLOFF_FRACTION);

        let threshold = self.speech_threshold(baseline);
        let loud = rms > threshold;
        let voice_band = centroid >= cfg.voice_centroid_min_hz
            && centroid <= cfg.voice_centroid_max_hz
            && rolloff <= cfg.voice_rolloff_max_hz;
        let speech = loud && voice_band;
        let noise_floor = cfg.noise_rms.max(threshold);
        let window_size = cfg.speech_window_size;
        let density_threshold = cfg.speech_density_threshold;

        let density = self.remember(speech);

        let (category, confidence) = if density >= density_threshold {
            self.recent_speech.clear();
            log::debug!(
                "[Audio] Speech in {}/{} recent buffers - sustained conversation",
                density,
                window_size
            );
            (
                AudioCategory::SustainedConversation,
                density as f32 / window_size as f32,
            )
        } else if speech {
            let excess = ((rms / threshold) - 1.0).min(1.0);
            (AudioCategory::SpeechDetected, 0.5 + 0.5 * excess)
        } else if rms > noise_floor {
            (AudioCategory::Noise, 0.6)
        } else {
            (AudioCategory::Quiet, 0.9)
        };

        Ok(Signal::new(SignalCategory::Audio(category), confidence, buffer.captured_at)
            .with_metric("rms", rms as f64)
            .with_metric("spectral_centroid", centroid as f64)
            .with_metric("spectral_rolloff", rolloff as f64)
            .with_metric("speech_density", density as f64))
    }
}
