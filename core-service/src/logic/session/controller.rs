//! Session Controller
//!
//! Owns one attempt end to end: calibration, samplers, the aggregator
//! actor, the sync worker and the journal. The UI side talks to the
//! running session through a `SessionHandle`.
//!
//! # Shutdown Order
//! Terminated: stop samplers -> flush sync -> force submission -> freeze journal.
//! Completed: same, without the forced submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::queue::{QueueItem, SignalQueue};
use super::sampler::{spawn_sampler, SamplerContext};
use crate::logic::baseline::{calibrate, Baseline};
use crate::logic::classifier::{
    AudioClassifier, Classifier, InputClassifier, VideoClassifier, WindowClassifier,
};
use crate::logic::config::ProctorConfig;
use crate::logic::device::DeviceProvider;
use crate::logic::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::logic::error::ProctorError;
use crate::logic::escalation::{AttemptStatus, Decision, TerminateDirective};
use crate::logic::events::{DecisionEvent, EventBus};
use crate::logic::journal::{Journal, JournalEntry};
use crate::logic::ledger::{Aggregator, IngestOutcome, LedgerSnapshot};
use crate::logic::signal::{InputEvent, WindowEvent};
use crate::logic::sync::{DirectiveSink, FlushReport, RemoteAuthority, SyncChannel, SyncEvent};

/// Exam-side collaborator that submits the attempt on termination
pub trait ExamSubmitter: Send + Sync {
    fn force_submit(&self, attempt_id: Uuid, reason: &str) -> Result<(), ProctorError>;
}

/// Final state of a finished session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub ledger: LedgerSnapshot,
    /// `None` when sync was disabled or the flush overran the stop timeout
    pub flush: Option<FlushReport>,
    pub frozen_digest: Option<String>,
    pub diagnostics: DiagnosticsSnapshot,
    pub force_submitted: bool,
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SessionController {
    config: ProctorConfig,
    devices: Arc<dyn DeviceProvider>,
    authority: Option<Arc<dyn RemoteAuthority>>,
    submitter: Arc<dyn ExamSubmitter>,
}

impl SessionController {
    pub fn new(
        config: ProctorConfig,
        devices: Arc<dyn DeviceProvider>,
        submitter: Arc<dyn ExamSubmitter>,
    ) -> Self {
        Self {
            config,
            devices,
            authority: None,
            submitter,
        }
    }

    /// Report to a remote authority (ignored when `sync.enabled` is false)
    pub fn with_authority(mut self, authority: Arc<dyn RemoteAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Calibrate, then start monitoring `attempt_id`.
    ///
    /// Fails only when the devices cannot be calibrated or opened; every
    /// later problem degrades the session instead.
    pub async fn start(&self, attempt_id: Uuid) -> Result<SessionHandle, ProctorError> {
        self.config.validate()?;
        log::info!("[Session] Calibrating for attempt {}", attempt_id);

        let baseline = Arc::new(calibrate(self.devices.as_ref(), &self.config.calibration).await?);
        let video = self.devices.open_video()?;
        let audio = self.devices.open_audio()?;

        let session = &self.config.session;
        let started_at = Utc::now();
        let diagnostics = Arc::new(Diagnostics::new());
        let queue = Arc::new(SignalQueue::new(session.signal_queue_capacity, diagnostics.clone()));
        let bus = EventBus::new();
        let snapshot = Arc::new(RwLock::new(LedgerSnapshot::empty(attempt_id)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sync = match &self.authority {
            Some(authority) if self.config.sync.enabled => {
                let directives = queue.clone();
                let sink: DirectiveSink = Arc::new(move |d: TerminateDirective| {
                    if !directives.push(QueueItem::Directive(d)) {
                        log::debug!("[Session] Directive arrived after shutdown");
                    }
                });
                Some(SyncChannel::spawn(
                    authority.clone(),
                    attempt_id,
                    self.config.sync.clone(),
                    diagnostics.clone(),
                    sink,
                ))
            }
            _ => {
                log::info!("[Session] Sync disabled, running offline");
                None
            }
        };

        let journal = match &session.journal_dir {
            Some(dir) => match Journal::open(dir, attempt_id) {
                Ok(journal) => Some(journal),
                Err(e) => {
                    log::warn!("[Session] Journal unavailable, continuing without: {}", e);
                    None
                }
            },
            None => None,
        };

        let ctx = SamplerContext {
            baseline: baseline.clone(),
            queue: queue.clone(),
            diagnostics: diagnostics.clone(),
            shutdown: shutdown_rx,
            device_timeout: Duration::from_millis(session.device_timeout_ms),
        };
        let samplers = vec![
            spawn_sampler(
                video,
                VideoClassifier::new(self.config.classifier.clone()),
                Duration::from_millis(session.video_interval_ms),
                ctx.clone(),
            ),
            spawn_sampler(
                audio,
                AudioClassifier::new(self.config.classifier.clone()),
                Duration::from_millis(session.audio_interval_ms),
                ctx,
            ),
        ];

        let actor = SessionActor {
            aggregator: Aggregator::new(attempt_id, started_at, self.config.policy.clone()),
            queue: queue.clone(),
            bus: bus.clone(),
            snapshot: snapshot.clone(),
            diagnostics: diagnostics.clone(),
            sync,
            journal,
            samplers,
            shutdown: shutdown_tx,
            submit: SubmitOnce::new(self.submitter.clone()),
            termination_reason: None,
            stop_timeout: Duration::from_millis(session.stop_timeout_ms),
        };
        let task = tokio::spawn(actor.run());

        log::info!("[Session] Attempt {} started", attempt_id);
        Ok(SessionHandle {
            attempt_id,
            started_at,
            baseline,
            queue,
            bus,
            snapshot,
            diagnostics,
            input: Mutex::new(InputClassifier::new(&self.config.classifier)),
            task: Some(task),
        })
    }
}

// ============================================================================
// HANDLE
// ============================================================================

pub struct SessionHandle {
    attempt_id: Uuid,
    started_at: DateTime<Utc>,
    baseline: Arc<Baseline>,
    queue: Arc<SignalQueue>,
    bus: EventBus,
    snapshot: Arc<RwLock<LedgerSnapshot>>,
    diagnostics: Arc<Diagnostics>,
    input: Mutex<InputClassifier>,
    task: Option<JoinHandle<SessionSummary>>,
}

impl SessionHandle {
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn report_window_event(&self, event: WindowEvent) -> Result<(), ProctorError> {
        let signal = WindowClassifier::new().classify(&event, &self.baseline)?;
        self.enqueue(QueueItem::Signal(signal));
        Ok(())
    }

    pub fn report_input_event(&self, event: InputEvent) -> Result<(), ProctorError> {
        let signal = match self.input.lock().classify(&event, &self.baseline) {
            Ok(signal) => signal,
            Err(e) => {
                self.diagnostics.record_classification_error();
                return Err(e);
            }
        };
        self.enqueue(QueueItem::Signal(signal));
        Ok(())
    }

    /// Server push from any transport
    pub fn deliver_directive(&self, directive: TerminateDirective) {
        self.enqueue(QueueItem::Directive(directive));
    }

    /// Normal submission by the candidate
    pub fn complete(&self) {
        self.enqueue(QueueItem::Complete);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot.read().clone()
    }

    pub fn status(&self) -> AttemptStatus {
        self.snapshot.read().status
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.bus.subscribe()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait until the attempt ends and the shutdown sequence is done
    pub async fn finished(mut self) -> Result<SessionSummary, ProctorError> {
        let task = self
            .task
            .take()
            .ok_or_else(|| ProctorError::Io("session already awaited".to_string()))?;
        task.await
            .map_err(|e| ProctorError::Io(format!("session task failed: {}", e)))
    }

    fn enqueue(&self, item: QueueItem) {
        if !self.queue.push(item) {
            self.diagnostics.record_rejected();
            log::debug!("[Session] Attempt {} already shut down", self.attempt_id);
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Abandoned while running: the actor drops the shutdown sender,
        // which stops the samplers too
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                log::warn!("[Session] Handle dropped, aborting attempt {}", self.attempt_id);
                task.abort();
            }
        }
    }
}

// ============================================================================
// ACTOR
// ============================================================================

struct SubmitOnce {
    submitter: Arc<dyn ExamSubmitter>,
    fired: AtomicBool,
}

impl SubmitOnce {
    fn new(submitter: Arc<dyn ExamSubmitter>) -> Self {
        Self {
            submitter,
            fired: AtomicBool::new(false),
        }
    }

    /// `false` when already submitted
    fn submit(&self, attempt_id: Uuid, reason: &str) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.submitter.force_submit(attempt_id, reason) {
            Ok(()) => log::info!("[Session] Attempt {} force-submitted: {}", attempt_id, reason),
            Err(e) => log::error!("[Session] Forced submission of {} failed: {}", attempt_id, e),
        }
        true
    }
}

/// Single writer of the attempt
struct SessionActor {
    aggregator: Aggregator,
    queue: Arc<SignalQueue>,
    bus: EventBus,
    snapshot: Arc<RwLock<LedgerSnapshot>>,
    diagnostics: Arc<Diagnostics>,
    sync: Option<SyncChannel>,
    journal: Option<Journal>,
    samplers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    submit: SubmitOnce,
    termination_reason: Option<String>,
    stop_timeout: Duration,
}

impl SessionActor {
    async fn run(mut self) -> SessionSummary {
        while let Some(item) = self.queue.pop().await {
            let decision = match item {
                QueueItem::Signal(signal) => {
                    self.diagnostics.record_ingested();
                    match self.aggregator.ingest(&signal) {
                        IngestOutcome::Ignored => continue,
                        IngestOutcome::Rejected => {
                            self.diagnostics.record_rejected();
                            continue;
                        }
                        IngestOutcome::Appended(decision) => decision,
                    }
                }
                QueueItem::Directive(directive) => {
                    self.journal_entry(JournalEntry::Directive(directive.clone()));
                    self.aggregator.apply_directive(&directive, Utc::now())
                }
                QueueItem::Complete => self.aggregator.complete(Utc::now()),
            };

            self.publish(decision);
            if self.aggregator.status().is_terminal() {
                break;
            }
        }
        self.shutdown().await
    }

    fn publish(&mut self, decision: Decision) {
        if decision.triggering_violation.is_none() && decision.transition.is_none() {
            return;
        }
        let attempt_id = self.aggregator.attempt().id;

        if let Some(v) = &decision.triggering_violation {
            log::warn!(
                "[Session] Violation #{} {} ({}) on attempt {}",
                v.id,
                v.violation_type,
                v.severity,
                attempt_id
            );
            self.journal_entry(JournalEntry::Violation(v.clone()));
            self.send(SyncEvent::Violation(v.clone()));
        }

        if let Some(t) = &decision.transition {
            match &t.reason {
                Some(reason) => log::warn!("[Session] {} -> {}: {}", t.from, t.to, reason),
                None => log::info!("[Session] {} -> {}", t.from, t.to),
            }
            if t.to == AttemptStatus::Terminated {
                self.termination_reason = Some(
                    t.reason
                        .as_ref()
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "terminated".to_string()),
                );
            }
            self.journal_entry(JournalEntry::Transition(t.clone()));
            self.send(SyncEvent::Transition(t.clone()));
        }

        *self.snapshot.write() = self.aggregator.snapshot();
        self.bus.emit(DecisionEvent::from_decision(attempt_id, &decision));
    }

    fn send(&self, event: SyncEvent) {
        if let Some(sync) = &self.sync {
            sync.send(event);
        }
    }

    fn journal_entry(&mut self, entry: JournalEntry) {
        if let Some(journal) = &mut self.journal {
            if let Err(e) = journal.record(entry) {
                log::warn!("[Session] Journal write failed: {}", e);
            }
        }
    }

    async fn shutdown(mut self) -> SessionSummary {
        let attempt_id = self.aggregator.attempt().id;
        let status = self.aggregator.status();
        let deadline = tokio::time::Instant::now() + self.stop_timeout;
        log::info!("[Session] Attempt {} is {}, shutting down", attempt_id, status);

        // 1. Samplers
        let _ = self.shutdown.send(true);
        for mut handle in std::mem::take(&mut self.samplers) {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                log::warn!("[Session] Sampler did not stop in time, aborting");
                handle.abort();
            }
        }
        self.queue.close();
        while let Some(item) = self.queue.pop().await {
            if matches!(item, QueueItem::Signal(_)) {
                self.diagnostics.record_rejected();
            }
        }

        // 2. Sync flush
        let flush = match self.sync.take() {
            Some(sync) => match tokio::time::timeout(self.stop_timeout, sync.flush()).await {
                Ok(report) => {
                    if !report.undelivered.is_empty() {
                        log::warn!(
                            "[Session] {} events could not be delivered",
                            report.undelivered.len()
                        );
                    }
                    Some(report)
                }
                Err(_) => {
                    log::warn!("[Session] Sync flush exceeded the stop timeout");
                    None
                }
            },
            None => None,
        };

        // 3. Forced submission
        let force_submitted = match (status, &self.termination_reason) {
            (AttemptStatus::Terminated, Some(reason)) => self.submit.submit(attempt_id, reason),
            (AttemptStatus::Terminated, None) => self.submit.submit(attempt_id, "terminated"),
            _ => false,
        };

        // 4. Frozen ledger
        let ledger = self.aggregator.snapshot();
        *self.snapshot.write() = ledger.clone();
        let frozen_digest = match self.journal.take() {
            Some(journal) => match journal.freeze(ledger.clone()) {
                Ok(frozen) => Some(frozen.digest),
                Err(e) => {
                    log::error!("[Session] Could not freeze ledger: {}", e);
                    None
                }
            },
            None => None,
        };

        log::info!(
            "[Session] Attempt {} finished: {} with {} violations",
            attempt_id,
            status,
            ledger.violations.len()
        );

        SessionSummary {
            attempt_id,
            status,
            ledger,
            flush,
            frozen_digest,
            diagnostics: self.diagnostics.snapshot(),
            force_submitted,
        }
    }
}
