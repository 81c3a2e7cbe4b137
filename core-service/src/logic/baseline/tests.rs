use chrono::Utc;

use super::{calibrate, Calibrator};
use crate::logic::config::CalibrationConfig;
use crate::logic::error::ProctorError;
use crate::logic::signal::{AudioBuffer, VideoFrame};
use crate::logic::simulate::{SyntheticDevices, VideoScene};

fn fast_config() -> CalibrationConfig {
    CalibrationConfig {
        duration_ms: 300,
        sample_interval_ms: 10,
        min_video_samples: 3,
        min_audio_samples: 3,
        device_timeout_ms: 500,
    }
}

#[test]
fn test_calibrator_statistics() {
    let mut c = Calibrator::new();
    let now = Utc::now();
    c.add_frame(&VideoFrame::filled(4, 4, [0, 0, 0], now)).unwrap();
    c.add_frame(&VideoFrame::filled(4, 4, [255, 255, 255], now)).unwrap();
    c.add_frame(&VideoFrame::filled(4, 4, [0, 0, 0], now)).unwrap();
    for _ in 0..3 {
        c.add_audio(&AudioBuffer::tone(440.0, 0.2, 800, 8000, now)).unwrap();
    }

    let b = c.finish(&fast_config(), now).unwrap();
    assert!((b.avg_brightness - 1.0 / 3.0).abs() < 1e-3);
    assert!(b.brightness_variance > 0.2);
    assert!((b.avg_audio_rms - 0.2 / 2f32.sqrt()).abs() < 0.01);
    assert!(b.audio_variance < 1e-6);
    assert_eq!(b.video_samples, 3);
}

#[test]
fn test_too_few_samples_is_device_unavailable() {
    let mut c = Calibrator::new();
    let now = Utc::now();
    c.add_frame(&VideoFrame::filled(4, 4, [90, 90, 90], now)).unwrap();

    match c.finish(&fast_config(), now) {
        Err(ProctorError::CalibrationFailed(inner)) => {
            assert!(matches!(*inner, ProctorError::DeviceUnavailable(_)));
        }
        other => panic!("Expected CalibrationFailed, got {:?}", other),
    }
}

#[test]
fn test_malformed_frame_rejected() {
    let mut c = Calibrator::new();
    let mut frame = VideoFrame::filled(4, 4, [90, 90, 90], Utc::now());
    frame.rgb.truncate(5);
    assert!(matches!(c.add_frame(&frame), Err(ProctorError::ClassificationError(_))));
    assert_eq!(c.video_samples(), 0);
}

#[tokio::test]
async fn test_calibrate_with_working_devices() {
    let devices = SyntheticDevices::new();
    let baseline = calibrate(&devices, &fast_config()).await.unwrap();
    assert!(baseline.video_samples >= 3);
    assert!(baseline.audio_samples >= 3);
    assert!(baseline.avg_brightness > 0.3 && baseline.avg_brightness < 0.7);
    assert!(baseline.avg_audio_rms < 0.01);
}

#[tokio::test]
async fn test_calibrate_blocks_on_missing_camera() {
    let devices = SyntheticDevices::new();
    devices.set_camera_available(false);
    let err = calibrate(&devices, &fast_config()).await.unwrap_err();
    assert!(err.blocks_session_start());
}

#[tokio::test]
async fn test_calibrate_blocks_on_permission_denied() {
    let devices = SyntheticDevices::new();
    devices.set_camera_permitted(false);
    match calibrate(&devices, &fast_config()).await {
        Err(ProctorError::CalibrationFailed(inner)) => {
            assert!(matches!(*inner, ProctorError::PermissionDenied(_)));
        }
        other => panic!("Expected PermissionDenied, got {:?}", other),
    }
}

#[tokio::test]
async fn test_disabled_track_fails_calibration() {
    let devices = SyntheticDevices::new();
    devices.set_video(VideoScene::Disabled);
    assert!(calibrate(&devices, &fast_config()).await.is_err());
}
