//! Configuration for the outdial engine.
//!
//! Mirrors the layered config layout used across the stack: a top-level
//! [`DialerConfig`] with focused sub-structs, each carrying sensible
//! defaults so tests and examples can start from `Default::default()`.

use serde::Deserialize;

use crate::error::{DialerError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DialerConfig {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub dialing: DialingConfig,
}

/// General server settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Publicly reachable base URL for provider callbacks (no trailing slash).
    /// Empty means outbound dialing is not configured; claim-only operations
    /// still work.
    pub public_base_url: String,
    /// Address the HTTP API binds to
    pub listen_addr: String,
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite://dialer.db?mode=rwc` or `sqlite::memory:`
    pub database_url: String,
    pub max_connections: u32,
}

/// Dial strategy defaults, used when campaign configuration is silent
#[derive(Debug, Clone, Deserialize)]
pub struct DialingConfig {
    /// Default simultaneous calls for a parallel run
    pub default_concurrency: u32,
    /// Default over-dial multiplier compensating for expected no-answers
    pub default_dial_ratio: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            public_base_url: String::new(),
            listen_addr: "127.0.0.1:3001".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for DialingConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 10,
            default_dial_ratio: 1.0,
        }
    }
}

impl DialerConfig {
    /// Validate settings that would otherwise fail deep inside a dispatch path.
    pub fn validate(&self) -> Result<()> {
        if self.database.database_url.is_empty() {
            return Err(DialerError::configuration("database_url is empty"));
        }
        if self.dialing.default_concurrency == 0 {
            return Err(DialerError::configuration("default_concurrency must be at least 1"));
        }
        if self.dialing.default_dial_ratio <= 0.0 {
            return Err(DialerError::configuration("default_dial_ratio must be positive"));
        }
        Ok(())
    }

    /// Base URL for provider callbacks, or a configuration error when unset.
    pub fn callback_base_url(&self) -> Result<&str> {
        let base = self.general.public_base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(DialerError::configuration("callback_base_url_missing"));
        }
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DialerConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_base_url_is_a_configuration_error() {
        let config = DialerConfig::default();
        assert!(matches!(
            config.callback_base_url(),
            Err(DialerError::Configuration(_))
        ));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let mut config = DialerConfig::default();
        config.general.public_base_url = "https://dialer.example.com/".to_string();
        assert_eq!(config.callback_base_url().unwrap(), "https://dialer.example.com");
    }
}
