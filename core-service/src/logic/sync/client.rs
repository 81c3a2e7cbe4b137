//! Authority API Client
//!
//! Wire types of the remote authority protocol and the HTTP client that
//! speaks it. The worker only sees the `RemoteAuthority` trait, so tests
//! can swap in an in-process authority.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::config::SyncConfig;
use crate::logic::error::ProctorError;
use crate::logic::escalation::{AttemptStatus, Directive, Transition};
use crate::logic::ledger::{Severity, Violation, ViolationType};

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub attempt_id: Uuid,
    /// Per-attempt sequence number; the authority dedupes replays on it
    pub id: u64,
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub severity: Severity,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<&Violation> for ViolationReport {
    fn from(v: &Violation) -> Self {
        Self {
            attempt_id: v.attempt_id,
            id: v.id,
            violation_type: v.violation_type,
            severity: v.severity,
            description: v.description.clone(),
            occurred_at: v.occurred_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerAction {
    Continue,
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationResponse {
    pub action: ServerAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub attempt_id: Uuid,
    pub from: AttemptStatus,
    pub to: AttemptStatus,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Transition> for TransitionReport {
    fn from(t: &Transition) -> Self {
        Self {
            attempt_id: t.attempt_id,
            from: t.from,
            to: t.to,
            occurred_at: t.occurred_at,
            reason: t.reason.as_ref().map(|r| r.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResponse {
    pub ack: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub attempt_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub server_time: i64,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Transport-level failures. All of them are retryable from the worker's view.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    NetworkError(String),
    Timeout,
    ServerError(u16),
    ParseError(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError(e) => write!(f, "Network error: {}", e),
            Self::Timeout => write!(f, "Request timed out"),
            Self::ServerError(code) => write!(f, "Server error: {}", code),
            Self::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<SyncError> for ProctorError {
    fn from(e: SyncError) -> Self {
        ProctorError::SyncError(e.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else if e.is_decode() {
            SyncError::ParseError(e.to_string())
        } else {
            SyncError::NetworkError(e.to_string())
        }
    }
}

// ============================================================================
// AUTHORITY TRAIT
// ============================================================================

pub type AuthorityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SyncError>> + Send + 'a>>;

/// The remote side of the sync channel
pub trait RemoteAuthority: Send + Sync {
    fn report_violation<'a>(&'a self, report: &'a ViolationReport)
        -> AuthorityFuture<'a, ViolationResponse>;

    fn report_transition<'a>(&'a self, report: &'a TransitionReport)
        -> AuthorityFuture<'a, AckResponse>;

    fn heartbeat(&self, attempt_id: Uuid) -> AuthorityFuture<'_, HeartbeatResponse>;

    fn health(&self) -> AuthorityFuture<'_, HealthResponse>;
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

pub struct HttpAuthority {
    server_url: String,
    http_client: reqwest::Client,
}

impl HttpAuthority {
    pub fn new(config: &SyncConfig) -> Result<Self, ProctorError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProctorError::SyncError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            server_url: config.server_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, SyncError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.server_url, path);
        let response = self.http_client.post(&url).json(body).send().await?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| SyncError::ParseError(e.to_string()))
        } else {
            Err(SyncError::ServerError(response.status().as_u16()))
        }
    }
}

impl RemoteAuthority for HttpAuthority {
    fn report_violation<'a>(&'a self, report: &'a ViolationReport)
        -> AuthorityFuture<'a, ViolationResponse>
    {
        Box::pin(self.post("/violation", report))
    }

    fn report_transition<'a>(&'a self, report: &'a TransitionReport)
        -> AuthorityFuture<'a, AckResponse>
    {
        Box::pin(self.post("/state-transition", report))
    }

    fn heartbeat(&self, attempt_id: Uuid) -> AuthorityFuture<'_, HeartbeatResponse> {
        Box::pin(async move { self.post("/heartbeat", &HeartbeatRequest { attempt_id }).await })
    }

    fn health(&self) -> AuthorityFuture<'_, HealthResponse> {
        Box::pin(async move {
            let url = format!("{}/health", self.server_url);
            let response = self.http_client.get(&url).send().await?;
            if response.status().is_success() {
                response
                    .json()
                    .await
                    .map_err(|e| SyncError::ParseError(e.to_string()))
            } else {
                Err(SyncError::ServerError(response.status().as_u16()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::escalation::TerminationReason;

    #[test]
    fn test_violation_report_wire_shape() {
        let v = Violation {
            id: 3,
            attempt_id: Uuid::nil(),
            violation_type: ViolationType::MultiplePeople,
            severity: Severity::High,
            description: "two faces".to_string(),
            occurred_at: Utc::now(),
        };
        let value = serde_json::to_value(ViolationReport::from(&v)).unwrap();
        assert_eq!(value["type"], "multiple_people");
        assert_eq!(value["severity"], "high");
        assert!(value.get("attemptId").is_some());
        assert!(value.get("occurredAt").is_some());
        assert_eq!(value["id"], 3);
    }

    #[test]
    fn test_responses_parse() {
        let r: ViolationResponse =
            serde_json::from_str(r#"{"action":"terminate","reason":"too many"}"#).unwrap();
        assert_eq!(r.action, ServerAction::Terminate);
        let r: ViolationResponse = serde_json::from_str(r#"{"action":"continue"}"#).unwrap();
        assert_eq!(r.reason, None);

        let hb: HeartbeatResponse = serde_json::from_str(r#"{"serverTime": 1}"#).unwrap();
        assert!(hb.directives.is_empty());
    }

    #[test]
    fn test_transition_report_carries_reason_text() {
        let t = Transition {
            attempt_id: Uuid::nil(),
            from: AttemptStatus::Warned,
            to: AttemptStatus::Terminated,
            occurred_at: Utc::now(),
            reason: Some(TerminationReason::ViolationCount { count: 7 }),
        };
        let report = TransitionReport::from(&t);
        assert_eq!(report.reason.as_deref(), Some("7 violations recorded"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["to"], "terminated");
    }

    #[test]
    fn test_http_authority_trims_url() {
        let config = SyncConfig {
            server_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        let authority = HttpAuthority::new(&config).unwrap();
        assert_eq!(authority.server_url(), "http://localhost:8080");
    }
}
