//! Synthetic Devices
//!
//! Scripted camera/microphone used by the demo binary and by tests.
//! Scenes are switched at runtime through a shared handle.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;

use crate::logic::device::{AudioSource, DeviceProvider, FnSource, VideoSource};
use crate::logic::error::ProctorError;
use crate::logic::signal::{AudioBuffer, VideoFrame};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;
pub const SAMPLE_RATE: u32 = 16_000;
pub const BUFFER_LEN: usize = 1024;

const BACKGROUND: [u8; 3] = [110, 115, 120];
const SKIN: [u8; 3] = [205, 150, 120];

// ============================================================================
// SCENES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoScene {
    OnePerson,
    Empty,
    TwoPeople,
    LookingAway,
    Covered,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioScene {
    Quiet,
    Speech,
    Noise,
}

pub fn scene_frame(scene: VideoScene) -> VideoFrame {
    let now = Utc::now();
    let (w, h) = (FRAME_WIDTH, FRAME_HEIGHT);
    let mut frame = VideoFrame::filled(w, h, BACKGROUND, now);
    match scene {
        VideoScene::OnePerson => frame.paint_rect(w / 2 - 8, 8, 16, 28, SKIN),
        VideoScene::Empty => {}
        VideoScene::TwoPeople => {
            frame.paint_rect(6, 8, 12, 26, SKIN);
            frame.paint_rect(w - 18, 8, 12, 26, SKIN);
        }
        VideoScene::LookingAway => frame.paint_rect(2, 8, 10, 26, SKIN),
        VideoScene::Covered => frame = VideoFrame::filled(w, h, [3, 3, 3], now),
        VideoScene::Disabled => frame.track_enabled = false,
    }
    frame
}

pub fn scene_audio(scene: AudioScene) -> AudioBuffer {
    let now = Utc::now();
    match scene {
        AudioScene::Quiet => {
            let mut rng = rand::thread_rng();
            let samples = (0..BUFFER_LEN).map(|_| rng.gen_range(-0.002..0.002)).collect();
            AudioBuffer {
                samples,
                sample_rate: SAMPLE_RATE,
                captured_at: now,
            }
        }
        AudioScene::Speech => {
            // Two formant-like tones in the voice band
            let low = AudioBuffer::tone(250.0, 0.25, BUFFER_LEN, SAMPLE_RATE, now);
            let high = AudioBuffer::tone(1000.0, 0.15, BUFFER_LEN, SAMPLE_RATE, now);
            AudioBuffer {
                samples: low
                    .samples
                    .iter()
                    .zip(high.samples.iter())
                    .map(|(a, b)| a + b)
                    .collect(),
                sample_rate: SAMPLE_RATE,
                captured_at: now,
            }
        }
        AudioScene::Noise => {
            let mut rng = rand::thread_rng();
            let samples = (0..BUFFER_LEN).map(|_| rng.gen_range(-0.4..0.4)).collect();
            AudioBuffer {
                samples,
                sample_rate: SAMPLE_RATE,
                captured_at: now,
            }
        }
    }
}

// ============================================================================
// DEVICE PROVIDER
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Script {
    video: VideoScene,
    audio: AudioScene,
    camera_available: bool,
    camera_permitted: bool,
    microphone_available: bool,
}

/// Provider whose devices render the current scene on every capture
#[derive(Clone)]
pub struct SyntheticDevices {
    script: Arc<RwLock<Script>>,
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self {
            script: Arc::new(RwLock::new(Script {
                video: VideoScene::OnePerson,
                audio: AudioScene::Quiet,
                camera_available: true,
                camera_permitted: true,
                microphone_available: true,
            })),
        }
    }

    pub fn set_video(&self, scene: VideoScene) {
        self.script.write().video = scene;
    }

    pub fn set_audio(&self, scene: AudioScene) {
        self.script.write().audio = scene;
    }

    pub fn set_camera_available(&self, available: bool) {
        self.script.write().camera_available = available;
    }

    pub fn set_camera_permitted(&self, permitted: bool) {
        self.script.write().camera_permitted = permitted;
    }

    pub fn set_microphone_available(&self, available: bool) {
        self.script.write().microphone_available = available;
    }
}

impl DeviceProvider for SyntheticDevices {
    fn open_video(&self) -> Result<VideoSource, ProctorError> {
        let s = *self.script.read();
        if !s.camera_permitted {
            return Err(ProctorError::PermissionDenied("camera".to_string()));
        }
        let script = self.script.clone();
        Ok(Box::new(FnSource::new("synthetic-camera", move || {
            let s = *script.read();
            if !s.camera_permitted {
                return Err(ProctorError::PermissionDenied("camera".to_string()));
            }
            if !s.camera_available {
                return Err(ProctorError::DeviceUnavailable("camera unplugged".to_string()));
            }
            Ok(scene_frame(s.video))
        })))
    }

    fn open_audio(&self) -> Result<AudioSource, ProctorError> {
        let script = self.script.clone();
        Ok(Box::new(FnSource::new("synthetic-microphone", move || {
            let s = *script.read();
            if !s.microphone_available {
                return Err(ProctorError::DeviceUnavailable("microphone unplugged".to_string()));
            }
            Ok(scene_audio(s.audio))
        })))
    }
}
