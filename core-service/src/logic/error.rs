//! Error Taxonomy
//!
//! Every fallible engine operation returns `Result<T, ProctorError>`.
//! Escalation outcomes are NOT errors - they travel as `Decision`s.

/// Engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum ProctorError {
    /// Device missing, unplugged, or not answering within its timeout
    DeviceUnavailable(String),
    /// User or OS refused access to a device
    PermissionDenied(String),
    /// Calibration could not produce a baseline (blocks session start)
    CalibrationFailed(Box<ProctorError>),
    /// A single bad sample - transient, sampling continues
    ClassificationError(String),
    /// Remote authority unreachable or returned garbage
    SyncError(String),
    /// Invalid configuration value
    Config(String),
    /// Journal / file system failure
    Io(String),
}

impl ProctorError {
    /// Errors that must stop a session from starting
    pub fn blocks_session_start(&self) -> bool {
        match self {
            Self::DeviceUnavailable(_) | Self::PermissionDenied(_) => true,
            Self::CalibrationFailed(inner) => inner.blocks_session_start(),
            _ => false,
        }
    }

    /// Short stable code for diagnostics and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::PermissionDenied(_) => "permission_denied",
            Self::CalibrationFailed(_) => "calibration_failed",
            Self::ClassificationError(_) => "classification_error",
            Self::SyncError(_) => "sync_error",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }
}

impl std::fmt::Display for ProctorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceUnavailable(e) => write!(f, "Device unavailable: {}", e),
            Self::PermissionDenied(e) => write!(f, "Permission denied: {}", e),
            Self::CalibrationFailed(e) => write!(f, "Calibration failed: {}", e),
            Self::ClassificationError(e) => write!(f, "Classification error: {}", e),
            Self::SyncError(e) => write!(f, "Sync error: {}", e),
            Self::Config(e) => write!(f, "Config error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ProctorError {}

impl From<std::io::Error> for ProctorError {
    fn from(err: std::io::Error) -> Self {
        ProctorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProctorError {
    fn from(err: serde_json::Error) -> Self {
        ProctorError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_failure_blocks_start() {
        let err = ProctorError::CalibrationFailed(Box::new(ProctorError::DeviceUnavailable(
            "camera".to_string(),
        )));
        assert!(err.blocks_session_start());
        assert!(err.to_string().contains("camera"));
    }

    #[test]
    fn test_runtime_errors_do_not_block() {
        assert!(!ProctorError::SyncError("timeout".into()).blocks_session_start());
        assert!(!ProctorError::ClassificationError("bad frame".into()).blocks_session_start());
    }
}
