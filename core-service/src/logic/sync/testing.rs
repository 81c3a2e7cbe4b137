//! In-process authority for tests

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::client::*;
use crate::logic::escalation::Directive;
use crate::logic::ledger::Severity;

#[derive(Default)]
pub struct MockAuthority {
    online: AtomicBool,
    /// Answer critical violations with `terminate`
    terminate_on_critical: AtomicBool,
    /// Added to every report call
    latency_ms: AtomicU64,
    violations: Mutex<Vec<ViolationReport>>,
    transitions: Mutex<Vec<TransitionReport>>,
    pending_directives: Mutex<Vec<Directive>>,
}

impl MockAuthority {
    pub fn online() -> Arc<Self> {
        let mock = Self::default();
        mock.online.store(true, Ordering::SeqCst);
        Arc::new(mock)
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn terminate_on_critical(&self) {
        self.terminate_on_critical.store(true, Ordering::SeqCst);
    }

    pub fn push_directive(&self, directive: Directive) {
        self.pending_directives.lock().push(directive);
    }

    pub fn violations(&self) -> Vec<ViolationReport> {
        self.violations.lock().clone()
    }

    pub fn transitions(&self) -> Vec<TransitionReport> {
        self.transitions.lock().clone()
    }

    async fn delay(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::NetworkError("connection refused".to_string()))
        }
    }
}

impl RemoteAuthority for MockAuthority {
    fn report_violation<'a>(&'a self, report: &'a ViolationReport)
        -> AuthorityFuture<'a, ViolationResponse>
    {
        Box::pin(async move {
            self.delay().await;
            self.check()?;
            self.violations.lock().push(report.clone());
            let terminate = report.severity == Severity::Critical
                && self.terminate_on_critical.load(Ordering::SeqCst);
            Ok(ViolationResponse {
                action: if terminate { ServerAction::Terminate } else { ServerAction::Continue },
                reason: terminate.then(|| "critical violation".to_string()),
            })
        })
    }

    fn report_transition<'a>(&'a self, report: &'a TransitionReport)
        -> AuthorityFuture<'a, AckResponse>
    {
        Box::pin(async move {
            self.delay().await;
            self.check()?;
            self.transitions.lock().push(report.clone());
            Ok(AckResponse { ack: true })
        })
    }

    fn heartbeat(&self, _attempt_id: Uuid) -> AuthorityFuture<'_, HeartbeatResponse> {
        Box::pin(async move {
            self.check()?;
            let directives = std::mem::take(&mut *self.pending_directives.lock());
            Ok(HeartbeatResponse {
                server_time: Utc::now().timestamp(),
                directives,
            })
        })
    }

    fn health(&self) -> AuthorityFuture<'_, HealthResponse> {
        Box::pin(async move {
            self.check()?;
            Ok(HealthResponse {
                status: "ok".to_string(),
                version: "test".to_string(),
                timestamp: Utc::now().timestamp(),
            })
        })
    }
}
