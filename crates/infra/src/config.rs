//! Ledger configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `STOCKLEDGER_DEFAULT_PAGE_SIZE` | 50 |
//! | `STOCKLEDGER_MAX_PAGE_SIZE` | 1000 |
//! | `STOCKLEDGER_LOCK_TIMEOUT_MS` | 2000 |
//! | `DATABASE_URL` | unset (in-memory store) |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PAGE_SIZE_VAR: &str = "STOCKLEDGER_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE_VAR: &str = "STOCKLEDGER_MAX_PAGE_SIZE";
pub const LOCK_TIMEOUT_VAR: &str = "STOCKLEDGER_LOCK_TIMEOUT_MS";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Page size used when a caller does not ask for one.
    pub default_page_size: u32,
    /// Hard cap on any requested page size.
    pub max_page_size: u32,
    /// How long a transaction waits for a locked row before failing with `Conflict`.
    pub lock_timeout: Duration,
    pub database_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
            lock_timeout: Duration::from_millis(2000),
            database_url: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            default_page_size: env_parse(DEFAULT_PAGE_SIZE_VAR, defaults.default_page_size)?,
            max_page_size: env_parse(MAX_PAGE_SIZE_VAR, defaults.max_page_size)?,
            lock_timeout: Duration::from_millis(env_parse(
                LOCK_TIMEOUT_VAR,
                defaults.lock_timeout.as_millis() as u64,
            )?),
            database_url: env::var(DATABASE_URL_VAR)
                .ok()
                .filter(|url| !url.trim().is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid("default page size must be positive".into()));
        }
        if self.max_page_size < self.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "max page size {} is below the default page size {}",
                self.max_page_size, self.default_page_size
            )));
        }
        if self.lock_timeout.is_zero() {
            return Err(ConfigError::Invalid("lock timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Helper to parse an environment variable, falling back to `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
