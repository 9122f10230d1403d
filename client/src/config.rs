//! Configuration management for the client core.

use std::env;

/// Default transaction attempt budget, matching the retry behavior of
/// hosted document stores.
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 5;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Attempts granted to each optimistic transaction before it fails
    /// with `ConflictExceeded`.
    pub transaction_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let transaction_attempts = match env::var("BOARDSYNC_TX_ATTEMPTS") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidTransactionAttempts)?,
            Err(_) => DEFAULT_TRANSACTION_ATTEMPTS,
        };

        if transaction_attempts == 0 {
            return Err(ConfigError::InvalidTransactionAttempts);
        }

        Ok(Self {
            transaction_attempts,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transaction_attempts: DEFAULT_TRANSACTION_ATTEMPTS,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid BOARDSYNC_TX_ATTEMPTS value")]
    InvalidTransactionAttempts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = Config::default();
        assert_eq!(config.transaction_attempts, DEFAULT_TRANSACTION_ATTEMPTS);
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        // BOARDSYNC_TX_ATTEMPTS is not set in the test environment.
        let config = Config::from_env().unwrap();
        assert_eq!(config.transaction_attempts, DEFAULT_TRANSACTION_ATTEMPTS);
    }
}
