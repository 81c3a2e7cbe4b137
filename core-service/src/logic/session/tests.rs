//! End-to-end session scenarios on synthetic devices

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::*;
use crate::logic::config::{CalibrationConfig, ProctorConfig, SessionConfig, SyncConfig};
use crate::logic::error::ProctorError;
use crate::logic::escalation::{AttemptStatus, Directive, TerminateDirective};
use crate::logic::journal::{read_frozen, read_journal, JournalEntry};
use crate::logic::ledger::ViolationType;
use crate::logic::signal::{InputEvent, InputEventKind, WindowEvent, WindowEventKind};
use crate::logic::simulate::{AudioScene, SyntheticDevices};
use crate::logic::sync::testing::MockAuthority;

// ============================================================================
// HELPERS
// ============================================================================

#[derive(Default)]
struct RecordingSubmitter {
    calls: Mutex<Vec<(Uuid, String)>>,
}

impl ExamSubmitter for RecordingSubmitter {
    fn force_submit(&self, attempt_id: Uuid, reason: &str) -> Result<(), ProctorError> {
        self.calls.lock().push((attempt_id, reason.to_string()));
        Ok(())
    }
}

fn fast_config() -> ProctorConfig {
    ProctorConfig {
        calibration: CalibrationConfig {
            duration_ms: 150,
            sample_interval_ms: 10,
            min_video_samples: 3,
            min_audio_samples: 3,
            device_timeout_ms: 500,
        },
        session: SessionConfig {
            video_interval_ms: 20,
            audio_interval_ms: 20,
            signal_queue_capacity: 64,
            device_timeout_ms: 500,
            stop_timeout_ms: 2_000,
            journal_dir: None,
        },
        sync: SyncConfig {
            enabled: false,
            sync_retry_backoff_ms: 10,
            sync_max_backoff_ms: 40,
            heartbeat_interval_secs: 0,
            flush_timeout_ms: 1_000,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn controller(
    config: ProctorConfig,
    devices: &SyntheticDevices,
) -> (SessionController, Arc<RecordingSubmitter>) {
    let submitter = Arc::new(RecordingSubmitter::default());
    let controller = SessionController::new(config, Arc::new(devices.clone()), submitter.clone());
    (controller, submitter)
}

async fn wait(handle: SessionHandle) -> SessionSummary {
    tokio::time::timeout(Duration::from_secs(10), handle.finished())
        .await
        .expect("session did not finish in time")
        .unwrap()
}

fn copy_event() -> InputEvent {
    InputEvent {
        kind: InputEventKind::Copy,
        at: Utc::now(),
    }
}

fn journal_path(dir: &Path, attempt: Uuid) -> std::path::PathBuf {
    dir.join(format!("{}.jsonl", attempt))
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_conversation_terminates_and_force_submits_once() {
    let devices = SyntheticDevices::new();
    let (controller, submitter) = controller(fast_config(), &devices);
    let attempt = Uuid::new_v4();

    let handle = controller.start(attempt).await.unwrap();
    let mut events = handle.subscribe();
    devices.set_audio(AudioScene::Speech);

    let summary = wait(handle).await;
    assert_eq!(summary.status, AttemptStatus::Terminated);
    assert!(summary.force_submitted);

    let last = summary.ledger.violations.last().unwrap();
    assert_eq!(last.violation_type, ViolationType::SustainedConversation);

    let calls = submitter.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, attempt);
    assert!(calls[0].1.contains("sustained_conversation"));

    let mut last_event = None;
    while let Ok(event) = events.try_recv() {
        last_event = Some(event);
    }
    assert_eq!(last_event.unwrap().decision, AttemptStatus::Terminated);
}

#[tokio::test]
async fn test_completion_does_not_force_submit() {
    let devices = SyntheticDevices::new();
    let (controller, submitter) = controller(fast_config(), &devices);
    let handle = controller.start(Uuid::new_v4()).await.unwrap();

    handle.report_input_event(copy_event()).unwrap();
    handle.complete();

    let summary = wait(handle).await;
    assert_eq!(summary.status, AttemptStatus::Completed);
    assert!(!summary.force_submitted);
    assert!(submitter.calls.lock().is_empty());
    assert_eq!(summary.ledger.violations.len(), 1);
    assert_eq!(summary.ledger.violations[0].violation_type, ViolationType::CopyPaste);
}

#[tokio::test]
async fn test_server_directive_overrides() {
    let devices = SyntheticDevices::new();
    let (controller, submitter) = controller(fast_config(), &devices);
    let attempt = Uuid::new_v4();
    let handle = controller.start(attempt).await.unwrap();

    // Not ours: ignored
    handle.deliver_directive(TerminateDirective {
        attempt_id: Uuid::new_v4(),
        reason: "wrong attempt".to_string(),
    });
    handle.deliver_directive(TerminateDirective {
        attempt_id: attempt,
        reason: "proctor ended the exam".to_string(),
    });

    let summary = wait(handle).await;
    assert_eq!(summary.status, AttemptStatus::Terminated);
    assert!(summary.ledger.violations.is_empty());
    let calls = submitter.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.contains("proctor ended the exam"));
}

#[tokio::test]
async fn test_window_events_flow_through_debounce() {
    let devices = SyntheticDevices::new();
    let (controller, _) = controller(fast_config(), &devices);
    let handle = controller.start(Uuid::new_v4()).await.unwrap();

    // Three departures within the window; hidden+blur pairs count once
    for _ in 0..3 {
        for kind in [
            WindowEventKind::VisibilityHidden,
            WindowEventKind::Blur,
            WindowEventKind::Focus,
        ] {
            handle
                .report_window_event(WindowEvent { kind, at: Utc::now() })
                .unwrap();
        }
    }
    handle.complete();

    let summary = wait(handle).await;
    let tab_switches = summary
        .ledger
        .violations
        .iter()
        .filter(|v| v.violation_type == ViolationType::TabSwitch)
        .count();
    assert_eq!(tab_switches, 1);
}

#[tokio::test]
async fn test_calibration_failure_blocks_start() {
    let devices = SyntheticDevices::new();
    devices.set_camera_permitted(false);
    let (controller, _) = controller(fast_config(), &devices);

    match controller.start(Uuid::new_v4()).await {
        Err(e @ ProctorError::CalibrationFailed(_)) => assert!(e.blocks_session_start()),
        Err(other) => panic!("Expected calibration failure, got {:?}", other),
        Ok(_) => panic!("Session must not start without a camera"),
    }
}

#[tokio::test]
async fn test_events_after_end_are_rejected() {
    let devices = SyntheticDevices::new();
    let (controller, _) = controller(fast_config(), &devices);
    let attempt = Uuid::new_v4();
    let handle = controller.start(attempt).await.unwrap();

    handle.complete();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    handle.report_input_event(copy_event()).unwrap();
    assert_eq!(handle.status(), AttemptStatus::Completed);
    assert!(handle.snapshot().violations.is_empty());
    assert!(handle.diagnostics().rejected_ingests >= 1);
}

// ============================================================================
// JOURNAL + SYNC
// ============================================================================

#[tokio::test]
async fn test_journal_records_attempt_and_frozen_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config();
    config.session.journal_dir = Some(dir.path().to_path_buf());

    let devices = SyntheticDevices::new();
    let (controller, _) = controller(config, &devices);
    let attempt = Uuid::new_v4();
    let handle = controller.start(attempt).await.unwrap();

    handle.report_input_event(copy_event()).unwrap();
    handle.complete();
    let summary = wait(handle).await;

    let records = read_journal(&journal_path(dir.path(), attempt)).unwrap();
    let entries: Vec<&JournalEntry> = records.iter().map(|r| &r.entry).collect();
    assert!(matches!(entries[0], JournalEntry::Started { .. }));
    assert!(entries.iter().any(|e| matches!(e, JournalEntry::Violation(_))));
    assert!(entries.iter().any(|e| matches!(e, JournalEntry::Transition(_))));
    assert!(matches!(entries.last(), Some(JournalEntry::Frozen { .. })));

    let frozen = read_frozen(&dir.path().join(format!("{}.ledger.json", attempt))).unwrap();
    assert!(frozen.verify().unwrap());
    assert_eq!(Some(frozen.digest), summary.frozen_digest);
}

#[tokio::test]
async fn test_violations_and_transitions_reach_authority() {
    let mut config = fast_config();
    config.sync.enabled = true;
    let devices = SyntheticDevices::new();
    let mock = MockAuthority::online();
    let (controller, _) = controller(config, &devices);
    let controller = controller.with_authority(mock.clone());

    let handle = controller.start(Uuid::new_v4()).await.unwrap();
    handle.report_input_event(copy_event()).unwrap();
    handle.complete();
    let summary = wait(handle).await;

    let flush = summary.flush.unwrap();
    assert!(flush.undelivered.is_empty());
    assert_eq!(mock.violations().len(), 1);
    assert_eq!(mock.transitions().len(), 1);
    assert_eq!(mock.transitions()[0].to, AttemptStatus::Completed);
}

#[tokio::test]
async fn test_heartbeat_directive_terminates_session() {
    let mut config = fast_config();
    config.sync.enabled = true;
    config.sync.heartbeat_interval_secs = 1;
    let devices = SyntheticDevices::new();
    let mock = MockAuthority::online();
    let attempt = Uuid::new_v4();
    mock.push_directive(Directive::TerminateDirective(TerminateDirective {
        attempt_id: attempt,
        reason: "identity check failed".to_string(),
    }));

    let (controller, submitter) = controller(config, &devices);
    let controller = controller.with_authority(mock.clone());
    let handle = controller.start(attempt).await.unwrap();

    let summary = wait(handle).await;
    assert_eq!(summary.status, AttemptStatus::Terminated);
    assert_eq!(submitter.calls.lock().len(), 1);
    assert_eq!(mock.transitions()[0].to, AttemptStatus::Terminated);
}
