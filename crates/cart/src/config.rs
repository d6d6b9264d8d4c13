//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (REST gateway only)
//! - `CART_API_BASE_URL` - Base URL of the cart API
//! - `CART_API_ACCESS_TOKEN` - Access token sent with every request
//!
//! ## Optional
//! - `CART_DEBOUNCE_MS` - Quantity-change debounce delay (default: 400)
//! - `CART_REQUEST_TIMEOUT_MS` - Gateway request timeout (default: 10000)

use std::env;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default quiet window for quantity changes: short enough to feel
/// responsive, long enough to coalesce rapid clicks on a stepper control.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Default bound on gateway requests, so a hung request resolves as a
/// failure instead of leaving a line marked busy indefinitely.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Tuning for the store's debounce behavior.
#[derive(Debug, Clone)]
pub struct CartSyncConfig {
    /// Trailing-edge debounce delay for quantity changes.
    pub debounce_delay: Duration,
}

impl Default for CartSyncConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl CartSyncConfig {
    /// Load from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `CART_DEBOUNCE_MS` is set but not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            debounce_delay: Duration::from_millis(optional_millis(
                "CART_DEBOUNCE_MS",
                DEFAULT_DEBOUNCE_MS,
            )?),
        })
    }
}

/// Connection settings for [`crate::gateway::RestCartGateway`].
#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// Base URL of the cart API.
    pub base_url: Url,
    /// Access token sent with every request.
    pub access_token: SecretString,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RestGatewayConfig {
    /// Load from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base_url = require_env("CART_API_BASE_URL")?;
        let base_url = Url::parse(&raw_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_API_BASE_URL".to_string(),
                "URL must be hierarchical (http/https)".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            access_token: SecretString::from(require_env("CART_API_ACCESS_TOKEN")?),
            request_timeout: Duration::from_millis(optional_millis(
                "CART_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
        })
    }
}

/// Read a required environment variable.
fn require_env(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Read an optional millisecond value with a default.
fn optional_millis(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce_delay() {
        let config = CartSyncConfig::default();
        assert_eq!(config.debounce_delay, Duration::from_millis(400));
    }

    #[test]
    fn test_optional_millis_falls_back_to_default() {
        // Variable intentionally unset.
        assert_eq!(
            optional_millis("CART_TEST_UNSET_MS", 250).expect("default applies"),
            250
        );
    }
}
