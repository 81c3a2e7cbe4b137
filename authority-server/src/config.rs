//! Configuration module

use std::env;

/// Server-side terminate rule: violations per attempt before the
/// authority orders termination on its own
pub const MAX_VIOLATIONS_PER_ATTEMPT: usize = 7;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Violations per attempt that trigger a server-side terminate
    pub max_violations_per_attempt: usize,

    /// Answer critical violations with `terminate`
    pub terminate_on_critical: bool,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            max_violations_per_attempt: MAX_VIOLATIONS_PER_ATTEMPT,
            terminate_on_critical: true,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            max_violations_per_attempt: env::var("MAX_VIOLATIONS_PER_ATTEMPT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_violations_per_attempt),

            terminate_on_critical: env::var("TERMINATE_ON_CRITICAL")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.terminate_on_critical),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
