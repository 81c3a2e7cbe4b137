//! Sync Worker
//!
//! Background task that owns the sync buffer and talks to the authority.
//! Always delivers from the head of the buffer, so anything buffered while
//! offline is replayed in original order before newer events. The final
//! flush is the one exception: when the backlog cannot fit in the flush
//! window, critical events are sent first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::buffer::{Overflow, SyncBuffer, SyncEvent};
use super::client::{
    RemoteAuthority, ServerAction, SyncError, TransitionReport, ViolationReport,
};
use crate::logic::config::SyncConfig;
use crate::logic::diagnostics::Diagnostics;
use crate::logic::escalation::{Directive, TerminateDirective};

/// Where server overrides are fed back into the session
pub type DirectiveSink = Arc<dyn Fn(TerminateDirective) + Send + Sync>;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_connected: bool,
    pub pending: usize,
    pub delivered_count: u64,
    pub evicted_count: u64,
    pub consecutive_failures: u32,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub server_version: Option<String>,
}

/// Outcome of the final flush
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushReport {
    pub delivered: usize,
    /// Events still buffered when the flush deadline passed
    pub undelivered: Vec<SyncEvent>,
}

// ============================================================================
// CHANNEL HANDLE
// ============================================================================

enum SyncCommand {
    Event(SyncEvent),
    Flush(oneshot::Sender<FlushReport>),
}

/// Non-blocking sender side of the sync channel
pub struct SyncChannel {
    tx: mpsc::UnboundedSender<SyncCommand>,
    status: Arc<RwLock<SyncStatus>>,
    handle: JoinHandle<()>,
}

impl SyncChannel {
    /// Spawn the worker on the current runtime
    pub fn spawn(
        authority: Arc<dyn RemoteAuthority>,
        attempt_id: Uuid,
        config: SyncConfig,
        diagnostics: Arc<Diagnostics>,
        directives: DirectiveSink,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(SyncStatus::default()));

        let worker = SyncWorker {
            authority,
            attempt_id,
            buffer: SyncBuffer::new(config.sync_buffer_capacity),
            config,
            rx,
            directives,
            status: status.clone(),
            diagnostics,
            failures: 0,
            retry_at: None,
            round_trip: None,
        };
        let handle = tokio::spawn(worker.run());

        Self { tx, status, handle }
    }

    /// Fire-and-forget
    pub fn send(&self, event: SyncEvent) {
        if self.tx.send(SyncCommand::Event(event)).is_err() {
            log::warn!("[Sync] Worker gone, event dropped");
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Deliver what can be delivered within the flush timeout, then stop
    pub async fn flush(self) -> FlushReport {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Flush(reply_tx)).is_err() {
            return FlushReport::default();
        }
        let report = reply_rx.await.unwrap_or_default();
        let _ = self.handle.await;
        report
    }
}

// ============================================================================
// WORKER
// ============================================================================

struct SyncWorker {
    authority: Arc<dyn RemoteAuthority>,
    attempt_id: Uuid,
    config: SyncConfig,
    buffer: SyncBuffer,
    rx: mpsc::UnboundedReceiver<SyncCommand>,
    directives: DirectiveSink,
    status: Arc<RwLock<SyncStatus>>,
    diagnostics: Arc<Diagnostics>,
    failures: u32,
    retry_at: Option<Instant>,
    /// Smoothed delivery round trip, `None` until something was delivered
    round_trip: Option<Duration>,
}

impl SyncWorker {
    async fn run(mut self) {
        log::info!(
            "[Sync] Worker started for attempt {} (buffer {})",
            self.attempt_id,
            self.config.sync_buffer_capacity
        );
        self.check_health().await;

        let heartbeat_enabled = self.config.heartbeat_interval_secs > 0;
        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(self.config.heartbeat_interval_secs.max(1)));
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // Take everything already queued before touching the network
            while let Ok(cmd) = self.rx.try_recv() {
                if let Some(reply) = self.handle_command(cmd) {
                    let report = self.flush().await;
                    let _ = reply.send(report);
                    return;
                }
            }

            let due = self.retry_at.map_or(true, |at| Instant::now() >= at);
            if !self.buffer.is_empty() && due {
                self.deliver_head().await;
                continue;
            }

            let wake = if self.buffer.is_empty() { None } else { self.retry_at };
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => {
                        if let Some(reply) = self.handle_command(cmd) {
                            let report = self.flush().await;
                            let _ = reply.send(report);
                            return;
                        }
                    }
                    None => {
                        // Every sender dropped without a flush
                        let report = self.flush().await;
                        log::info!("[Sync] Channel closed ({} delivered on exit)", report.delivered);
                        return;
                    }
                },
                _ = sleep_until_opt(wake), if wake.is_some() => {}
                _ = heartbeat.tick(), if heartbeat_enabled => self.poll_heartbeat().await,
            }
        }
    }

    /// Returns the flush reply channel when the command asks to stop
    fn handle_command(&mut self, cmd: SyncCommand) -> Option<oneshot::Sender<FlushReport>> {
        match cmd {
            SyncCommand::Event(event) => {
                self.enqueue(event);
                None
            }
            SyncCommand::Flush(reply) => Some(reply),
        }
    }

    fn enqueue(&mut self, event: SyncEvent) {
        match self.buffer.push(event) {
            Overflow::None => {}
            Overflow::Evicted(lost) | Overflow::Discarded(lost) => {
                self.diagnostics.record_sync_eviction();
                self.status.write().evicted_count += 1;
                log::warn!(
                    "[Sync] DATA LOSS: buffer full ({}), dropped {}",
                    self.config.sync_buffer_capacity,
                    lost.label()
                );
            }
            Overflow::Overcommitted => {
                log::warn!(
                    "[Sync] Buffer over capacity with critical events ({} pending)",
                    self.buffer.len()
                );
            }
        }
        self.status.write().pending = self.buffer.len();
    }

    async fn send_event(&self, event: &SyncEvent) -> Result<Option<TerminateDirective>, SyncError> {
        match event {
            SyncEvent::Violation(v) => {
                let report = ViolationReport::from(v);
                let response = self.authority.report_violation(&report).await?;
                if response.action == ServerAction::Terminate {
                    return Ok(Some(TerminateDirective {
                        attempt_id: v.attempt_id,
                        reason: response
                            .reason
                            .unwrap_or_else(|| "terminated by authority".to_string()),
                    }));
                }
                Ok(None)
            }
            SyncEvent::Transition(t) => {
                let report = TransitionReport::from(t);
                self.authority.report_transition(&report).await?;
                Ok(None)
            }
        }
    }

    /// Try the head event once. Returns true when it was delivered.
    async fn deliver_head(&mut self) -> bool {
        let Some(event) = self.buffer.front().cloned() else {
            return true;
        };

        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.send_event(&event)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        };

        match result {
            Ok(directive) => {
                let elapsed = started.elapsed();
                self.round_trip = Some(match self.round_trip {
                    Some(avg) => (avg * 3 + elapsed) / 4,
                    None => elapsed,
                });
                self.buffer.pop_front();
                self.on_success();
                self.diagnostics.record_sync_delivered();
                {
                    let mut status = self.status.write();
                    status.delivered_count += 1;
                    status.pending = self.buffer.len();
                    status.last_sync = Some(Utc::now());
                }
                log::debug!("[Sync] Delivered {}", event.label());
                if let Some(directive) = directive {
                    log::warn!("[Sync] Authority requested termination: {}", directive.reason);
                    (self.directives)(directive);
                }
                true
            }
            Err(e) => {
                self.on_failure(&e);
                false
            }
        }
    }

    fn on_success(&mut self) {
        if self.failures > 0 {
            log::info!(
                "[Sync] Reconnected after {} failures, replaying {} buffered events",
                self.failures,
                self.buffer.len()
            );
        }
        self.failures = 0;
        self.retry_at = None;
        let mut status = self.status.write();
        status.is_connected = true;
        status.consecutive_failures = 0;
    }

    fn on_failure(&mut self, error: &SyncError) {
        self.failures += 1;
        let delay = self.backoff();
        self.retry_at = Some(Instant::now() + delay);
        self.diagnostics.record_sync_failure();
        {
            let mut status = self.status.write();
            status.is_connected = false;
            status.consecutive_failures = self.failures;
            status.last_error = Some(error.to_string());
        }
        log::warn!(
            "[Sync] Delivery failed ({}), retry #{} in {:?}",
            error,
            self.failures,
            delay
        );
    }

    /// `base * 2^(n-1)`, capped, with +-20% jitter
    fn backoff(&self) -> Duration {
        let exp = self.failures.saturating_sub(1).min(16);
        let base = self.config.sync_retry_backoff_ms.saturating_mul(1u64 << exp);
        let capped = base.min(self.config.sync_max_backoff_ms).max(1);
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((capped as f64 * jitter) as u64)
    }

    async fn check_health(&mut self) {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        match tokio::time::timeout(timeout, self.authority.health()).await {
            Ok(Ok(health)) => {
                log::info!("[Sync] Authority healthy: v{}", health.version);
                let mut status = self.status.write();
                status.is_connected = true;
                status.server_version = Some(health.version);
            }
            Ok(Err(e)) => log::warn!("[Sync] Authority not reachable: {}", e),
            Err(_) => log::warn!("[Sync] Authority health check timed out"),
        }
    }

    async fn poll_heartbeat(&mut self) {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let response = match tokio::time::timeout(timeout, self.authority.heartbeat(self.attempt_id)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                log::debug!("[Sync] Heartbeat failed: {}", e);
                return;
            }
            Err(_) => {
                log::debug!("[Sync] Heartbeat timed out");
                return;
            }
        };

        {
            let mut status = self.status.write();
            status.last_heartbeat = Some(Utc::now());
            status.is_connected = true;
        }
        // Authority is back: retry buffered events right away
        self.retry_at = None;

        for directive in response.directives {
            match directive {
                Directive::TerminateDirective(d) if d.attempt_id == self.attempt_id => {
                    log::warn!("[Sync] Heartbeat delivered terminate directive: {}", d.reason);
                    (self.directives)(d);
                }
                Directive::TerminateDirective(d) => {
                    log::warn!("[Sync] Ignoring directive for other attempt {}", d.attempt_id);
                }
            }
        }
    }

    /// Best-effort delivery bounded by `flush_timeout_ms`
    async fn flush(&mut self) -> FlushReport {
        let deadline = Instant::now() + Duration::from_millis(self.config.flush_timeout_ms);
        let mut delivered = 0;

        while let Ok(SyncCommand::Event(event)) = self.rx.try_recv() {
            self.enqueue(event);
        }

        // Not enough time for the whole backlog: terminations go first
        let per_event = self
            .round_trip
            .unwrap_or(Duration::from_millis(self.config.request_timeout_ms));
        let needed = per_event.saturating_mul(self.buffer.len().min(u32::MAX as usize) as u32);
        if needed > deadline.saturating_duration_since(Instant::now()) {
            let promoted = self.buffer.promote_critical();
            if promoted > 0 {
                log::warn!(
                    "[Sync] Backlog of {} exceeds the flush window, sending {} critical events first",
                    self.buffer.len(),
                    promoted
                );
            }
        }

        while !self.buffer.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let attempt = tokio::time::timeout(deadline - now, self.deliver_head()).await;
            match attempt {
                Ok(true) => delivered += 1,
                Ok(false) => {
                    let wait = self
                        .retry_at
                        .map(|at| at.min(deadline))
                        .unwrap_or(deadline);
                    tokio::time::sleep_until(wait).await;
                }
                Err(_) => break,
            }
        }

        let undelivered = self.buffer.drain();
        if undelivered.is_empty() {
            log::info!("[Sync] Flushed ({} delivered)", delivered);
        } else {
            log::warn!(
                "[Sync] Flush deadline reached: {} delivered, {} undelivered",
                delivered,
                undelivered.len()
            );
        }
        self.status.write().pending = 0;
        FlushReport { delivered, undelivered }
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
