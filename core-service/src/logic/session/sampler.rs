//! Periodic Samplers
//!
//! One tokio task per device. Each tick captures a sample off the runtime
//! under a deadline, classifies it and pushes the signal into the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::queue::{QueueItem, SignalQueue};
use crate::logic::baseline::Baseline;
use crate::logic::classifier::Classifier;
use crate::logic::device::{capture_with_timeout, DeviceSource};
use crate::logic::diagnostics::Diagnostics;
use crate::logic::error::ProctorError;

/// Everything a sampler task shares with the session
#[derive(Clone)]
pub struct SamplerContext {
    pub baseline: Arc<Baseline>,
    pub queue: Arc<SignalQueue>,
    pub diagnostics: Arc<Diagnostics>,
    pub shutdown: watch::Receiver<bool>,
    pub device_timeout: Duration,
}

pub fn spawn_sampler<T, C>(
    source: Box<dyn DeviceSource<T>>,
    classifier: C,
    interval: Duration,
    ctx: SamplerContext,
) -> JoinHandle<()>
where
    T: Send + 'static,
    C: Classifier<Sample = T> + 'static,
{
    tokio::spawn(run_sampler(source, classifier, interval, ctx))
}

async fn run_sampler<T, C>(
    source: Box<dyn DeviceSource<T>>,
    mut classifier: C,
    interval: Duration,
    mut ctx: SamplerContext,
) where
    T: Send + 'static,
    C: Classifier<Sample = T>,
{
    let name = classifier.name();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut source = Some(source);
    let mut produced: u64 = 0;

    log::info!("[Sampler] {} started (every {}ms)", name, interval.as_millis());

    loop {
        tokio::select! {
            biased;
            changed = ctx.shutdown.changed() => {
                if changed.is_err() || *ctx.shutdown.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let Some(device) = source.take() else {
            break;
        };
        let (back, result) = capture_with_timeout(device, ctx.device_timeout).await;
        source = back;

        let sample = match result {
            Ok(sample) => sample,
            Err(e @ ProctorError::ClassificationError(_)) => {
                ctx.diagnostics.record_classification_error();
                log::debug!("[Sampler] {} skipped sample: {}", name, e);
                continue;
            }
            Err(e) => {
                ctx.diagnostics.record_device_error();
                // Abandoned (timed out) or refused devices do not come back
                if source.is_none() || matches!(e, ProctorError::PermissionDenied(_)) {
                    log::warn!("[Sampler] {} stopped: {}", name, e);
                    break;
                }
                log::warn!("[Sampler] {} capture failed: {}", name, e);
                continue;
            }
        };

        match classifier.classify(&sample, &ctx.baseline) {
            Ok(signal) => {
                if !ctx.queue.push(QueueItem::Signal(signal)) {
                    break;
                }
                produced += 1;
            }
            Err(e) => {
                ctx.diagnostics.record_classification_error();
                log::debug!("[Sampler] {} classification failed: {}", name, e);
            }
        }
    }

    log::info!("[Sampler] {} stopped after {} signals", name, produced);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::classifier::VideoClassifier;
    use crate::logic::config::ClassifierConfig;
    use crate::logic::device::{FnSource, VideoSource};
    use crate::logic::signal::{SignalCategory, VideoCategory};
    use crate::logic::simulate::{scene_frame, VideoScene};
    use chrono::Utc;

    fn context(queue: Arc<SignalQueue>, diagnostics: Arc<Diagnostics>)
        -> (SamplerContext, watch::Sender<bool>)
    {
        let (tx, rx) = watch::channel(false);
        let ctx = SamplerContext {
            baseline: Arc::new(Baseline::neutral(Utc::now())),
            queue,
            diagnostics,
            shutdown: rx,
            device_timeout: Duration::from_millis(200),
        };
        (ctx, tx)
    }

    #[tokio::test]
    async fn test_sampler_pushes_signals_until_shutdown() {
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = Arc::new(SignalQueue::new(64, diagnostics.clone()));
        let (ctx, shutdown) = context(queue.clone(), diagnostics);

        let source: VideoSource = Box::new(FnSource::new("cam", || {
            Ok(scene_frame(VideoScene::Empty))
        }));
        let handle = spawn_sampler(
            source,
            VideoClassifier::new(ClassifierConfig::default()),
            Duration::from_millis(10),
            ctx,
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(queue.len() >= 2);
        match queue.pop().await {
            Some(QueueItem::Signal(s)) => {
                assert_eq!(s.category, SignalCategory::Video(VideoCategory::NoPerson))
            }
            other => panic!("Expected a video signal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hung_device_stops_sampler() {
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = Arc::new(SignalQueue::new(64, diagnostics.clone()));
        let (mut ctx, _shutdown) = context(queue.clone(), diagnostics.clone());
        ctx.device_timeout = Duration::from_millis(20);

        let source: VideoSource = Box::new(FnSource::new("cam", || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(scene_frame(VideoScene::OnePerson))
        }));
        let handle = spawn_sampler(
            source,
            VideoClassifier::new(ClassifierConfig::default()),
            Duration::from_millis(10),
            ctx,
        );

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(queue.is_empty());
        assert_eq!(diagnostics.snapshot().device_errors, 1);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_sampling() {
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = Arc::new(SignalQueue::new(64, diagnostics.clone()));
        let (ctx, shutdown) = context(queue.clone(), diagnostics.clone());

        let mut calls = 0;
        let source: VideoSource = Box::new(FnSource::new("cam", move || {
            calls += 1;
            if calls == 1 {
                Err(ProctorError::DeviceUnavailable("glitch".to_string()))
            } else {
                Ok(scene_frame(VideoScene::OnePerson))
            }
        }));
        let handle = spawn_sampler(
            source,
            VideoClassifier::new(ClassifierConfig::default()),
            Duration::from_millis(10),
            ctx,
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(diagnostics.snapshot().device_errors, 1);
        assert!(!queue.is_empty());
    }
}
