//! Central Configuration Constants
//!
//! Single source of truth for defaults that are not policy thresholds.
//! Policy thresholds live in `logic::config` with their documented defaults.

use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;

/// Default remote authority URL
///
/// For development: http://localhost:8080
pub const DEFAULT_AUTHORITY_URL: &str = "http://localhost:8080";

/// Default heartbeat / directive poll interval (seconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 15;

/// Journal directory name under the local data dir
pub const JOURNAL_DIR: &str = "proctor_journal";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "proctor-core";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get authority URL from environment or use default
pub fn get_authority_url() -> String {
    std::env::var("PROCTOR_SERVER_URL").unwrap_or_else(|_| DEFAULT_AUTHORITY_URL.to_string())
}

/// Check if sync with the remote authority is enabled
pub fn is_sync_enabled() -> bool {
    std::env::var("PROCTOR_SYNC_ENABLED")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}

/// Parse an environment variable, `None` when unset or malformed
pub fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring malformed {}={:?}", name, raw);
            None
        }
    }
}

/// Default journal location: `<local data dir>/proctor-core/proctor_journal`
static DEFAULT_JOURNAL_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(JOURNAL_DIR)
});

pub fn default_journal_dir() -> PathBuf {
    DEFAULT_JOURNAL_DIR.clone()
}
