//! Tests for the sync worker against an in-process authority

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::testing::MockAuthority;
use super::*;
use crate::logic::config::SyncConfig;
use crate::logic::diagnostics::Diagnostics;
use crate::logic::escalation::{
    AttemptStatus, Directive, TerminateDirective, TerminationReason, Transition,
};
use crate::logic::ledger::{Severity, Violation, ViolationType};

// ============================================================================
// HELPERS
// ============================================================================

fn fast_config() -> SyncConfig {
    SyncConfig {
        enabled: true,
        server_url: "http://unused".to_string(),
        sync_retry_backoff_ms: 10,
        sync_max_backoff_ms: 40,
        sync_buffer_capacity: 32,
        request_timeout_ms: 500,
        heartbeat_interval_secs: 0,
        flush_timeout_ms: 2_000,
    }
}

fn violation(attempt: Uuid, id: u64, severity: Severity) -> SyncEvent {
    SyncEvent::Violation(Violation {
        id,
        attempt_id: attempt,
        violation_type: ViolationType::CopyPaste,
        severity,
        description: format!("v{}", id),
        occurred_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
    })
}

fn collecting_sink() -> (DirectiveSink, Arc<Mutex<Vec<TerminateDirective>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink: DirectiveSink = Arc::new(move |d: TerminateDirective| sink_seen.lock().push(d));
    (sink, seen)
}

fn spawn(
    mock: Arc<MockAuthority>,
    attempt: Uuid,
    config: SyncConfig,
) -> (SyncChannel, Arc<Mutex<Vec<TerminateDirective>>>, Arc<Diagnostics>) {
    let diagnostics = Arc::new(Diagnostics::new());
    let (sink, seen) = collecting_sink();
    let channel = SyncChannel::spawn(mock, attempt, config, diagnostics.clone(), sink);
    (channel, seen, diagnostics)
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_delivers_in_order_when_online() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::online();
    let (channel, _, _) = spawn(mock.clone(), attempt, fast_config());

    for id in 1..=3 {
        channel.send(violation(attempt, id, Severity::Low));
    }
    let report = channel.flush().await;

    assert_eq!(report.delivered, 3);
    assert!(report.undelivered.is_empty());
    let ids: Vec<String> = mock.violations().into_iter().map(|v| v.description).collect();
    assert_eq!(ids, vec!["v1", "v2", "v3"]);
}

#[tokio::test]
async fn test_buffered_events_replay_in_order_after_reconnect() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::offline();
    let (channel, _, diagnostics) = spawn(mock.clone(), attempt, fast_config());

    for id in 1..=5 {
        channel.send(violation(attempt, id, Severity::Medium));
    }
    tokio::time::sleep(Duration::from_millis(80)).await;

    let status = channel.status();
    assert!(!status.is_connected);
    assert_eq!(status.pending, 5);
    assert!(mock.violations().is_empty());
    assert!(diagnostics.snapshot().sync_failures >= 1);

    mock.set_online(true);
    channel.send(violation(attempt, 6, Severity::Medium));
    let report = channel.flush().await;

    assert!(report.undelivered.is_empty());
    let ids: Vec<String> = mock.violations().into_iter().map(|v| v.description).collect();
    assert_eq!(ids, vec!["v1", "v2", "v3", "v4", "v5", "v6"]);
}

#[tokio::test]
async fn test_flush_reports_undelivered_when_offline() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::offline();
    let config = SyncConfig {
        flush_timeout_ms: 100,
        ..fast_config()
    };
    let (channel, _, _) = spawn(mock, attempt, config);

    channel.send(violation(attempt, 1, Severity::High));
    channel.send(violation(attempt, 2, Severity::High));
    let report = channel.flush().await;

    assert_eq!(report.delivered, 0);
    assert_eq!(report.undelivered.len(), 2);
}

#[tokio::test]
async fn test_overflow_while_offline_counts_data_loss() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::offline();
    let config = SyncConfig {
        sync_buffer_capacity: 2,
        flush_timeout_ms: 50,
        ..fast_config()
    };
    let (channel, _, diagnostics) = spawn(mock, attempt, config);

    channel.send(violation(attempt, 1, Severity::Low));
    channel.send(violation(attempt, 2, Severity::Low));
    channel.send(violation(attempt, 3, Severity::Critical));
    let report = channel.flush().await;

    assert_eq!(diagnostics.snapshot().sync_evictions, 1);
    let mut kept: Vec<u64> = report
        .undelivered
        .iter()
        .filter_map(|e| match e {
            SyncEvent::Violation(v) => Some(v.id),
            SyncEvent::Transition(_) => None,
        })
        .collect();
    // The critical event may have been moved ahead for the flush
    kept.sort_unstable();
    assert_eq!(kept, vec![2, 3]);
}

#[tokio::test]
async fn test_flush_sends_termination_ahead_of_long_backlog() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::offline();
    let config = SyncConfig {
        sync_buffer_capacity: 64,
        flush_timeout_ms: 300,
        ..fast_config()
    };
    let (channel, _, _) = spawn(mock.clone(), attempt, config);

    for id in 1..=30 {
        channel.send(violation(attempt, id, Severity::Low));
    }
    channel.send(SyncEvent::Transition(Transition {
        attempt_id: attempt,
        from: AttemptStatus::Warned,
        to: AttemptStatus::Terminated,
        occurred_at: Utc::now(),
        reason: Some(TerminationReason::ViolationCount { count: 7 }),
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;

    mock.set_latency(Duration::from_millis(40));
    mock.set_online(true);
    let report = channel.flush().await;

    let transitions = mock.transitions();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].to, AttemptStatus::Terminated);
    assert!(!report.undelivered.is_empty());
    assert!(report
        .undelivered
        .iter()
        .all(|e| e.priority() == Priority::Low));
}

#[tokio::test]
async fn test_terminate_response_feeds_directive_back() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::online();
    mock.terminate_on_critical();
    let (channel, seen, _) = spawn(mock.clone(), attempt, fast_config());

    channel.send(violation(attempt, 1, Severity::Critical));
    channel.send(SyncEvent::Transition(Transition {
        attempt_id: attempt,
        from: AttemptStatus::Active,
        to: AttemptStatus::Terminated,
        occurred_at: Utc::now(),
        reason: Some(TerminationReason::CriticalViolation {
            violation_type: ViolationType::CopyPaste,
        }),
    }));
    channel.flush().await;

    let directives = seen.lock().clone();
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].attempt_id, attempt);
    assert_eq!(mock.transitions().len(), 1);
    assert_eq!(mock.transitions()[0].to, AttemptStatus::Terminated);
}

#[tokio::test]
async fn test_heartbeat_polls_directives() {
    let attempt = Uuid::new_v4();
    let mock = MockAuthority::online();
    mock.push_directive(Directive::TerminateDirective(TerminateDirective {
        attempt_id: attempt,
        reason: "proctor ended the exam".to_string(),
    }));
    mock.push_directive(Directive::TerminateDirective(TerminateDirective {
        attempt_id: Uuid::new_v4(),
        reason: "someone else".to_string(),
    }));
    let config = SyncConfig {
        heartbeat_interval_secs: 30,
        ..fast_config()
    };
    let (channel, seen, _) = spawn(mock, attempt, config);

    // First heartbeat tick fires immediately
    tokio::time::sleep(Duration::from_millis(50)).await;
    let directives = seen.lock().clone();
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].reason, "proctor ended the exam");
    assert!(channel.status().last_heartbeat.is_some());
    channel.flush().await;
}
