//! Device Capture Interface
//!
//! Camera/microphone acquisition is an external collaborator. The engine only
//! sees blocking `capture()` calls, which it always runs off the async
//! runtime and under a timeout.

use std::time::Duration;

use crate::logic::error::ProctorError;
use crate::logic::signal::{AudioBuffer, VideoFrame};

/// A device that yields one raw sample per call (blocking)
pub trait DeviceSource<T>: Send + 'static {
    fn name(&self) -> &str;
    fn capture(&mut self) -> Result<T, ProctorError>;
}

pub type VideoSource = Box<dyn DeviceSource<VideoFrame>>;
pub type AudioSource = Box<dyn DeviceSource<AudioBuffer>>;

/// Opens devices. Failures surface as `DeviceUnavailable` / `PermissionDenied`.
pub trait DeviceProvider: Send + Sync {
    fn open_video(&self) -> Result<VideoSource, ProctorError>;
    fn open_audio(&self) -> Result<AudioSource, ProctorError>;
}

/// Run one blocking capture with a deadline.
///
/// The source is handed back on completion. On timeout the blocking call is
/// abandoned together with the source (force-released).
pub async fn capture_with_timeout<T: Send + 'static>(
    source: Box<dyn DeviceSource<T>>,
    timeout: Duration,
) -> (Option<Box<dyn DeviceSource<T>>>, Result<T, ProctorError>) {
    let name = source.name().to_string();
    let task = tokio::task::spawn_blocking(move || {
        let mut source = source;
        let result = source.capture();
        (source, result)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok((source, result))) => (Some(source), result),
        Ok(Err(join_err)) => (
            None,
            Err(ProctorError::DeviceUnavailable(format!(
                "{} capture task failed: {}",
                name, join_err
            ))),
        ),
        Err(_) => (
            None,
            Err(ProctorError::DeviceUnavailable(format!(
                "{} did not answer within {}ms",
                name,
                timeout.as_millis()
            ))),
        ),
    }
}

// ============================================================================
// CLOSURE-BACKED SOURCE
// ============================================================================

/// Adapter turning a closure into a device (synthetic devices, bridges)
pub struct FnSource<F> {
    name: String,
    f: F,
}

impl<F> FnSource<F> {
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<T, F> DeviceSource<T> for FnSource<F>
where
    F: FnMut() -> Result<T, ProctorError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&mut self) -> Result<T, ProctorError> {
        (self.f)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_capture_returns_source() {
        let source: VideoSource = Box::new(FnSource::new("cam", || {
            Ok(VideoFrame::filled(2, 2, [10, 10, 10], Utc::now()))
        }));
        let (back, result) = capture_with_timeout(source, Duration::from_secs(1)).await;
        assert!(back.is_some());
        assert_eq!(result.unwrap().width, 2);
    }

    #[tokio::test]
    async fn test_capture_times_out() {
        let source: AudioSource = Box::new(FnSource::new("mic", || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(AudioBuffer::silence(8, 8000, Utc::now()))
        }));
        let (back, result) = capture_with_timeout(source, Duration::from_millis(20)).await;
        assert!(back.is_none());
        assert!(matches!(result, Err(ProctorError::DeviceUnavailable(_))));
    }
}
