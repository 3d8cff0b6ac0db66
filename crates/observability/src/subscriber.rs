//! Tracing subscriber initialization.
//!
//! - `RUST_LOG` overrides the filter (default `info`)
//! - `STOCKLEDGER_LOG_FORMAT` selects `json` (default, for log aggregation) or `pretty`

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "STOCKLEDGER_LOG_FORMAT";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogConfigError {
    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{other}' (expected json or pretty)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self, LogConfigError> {
        let format = match env::var(LOG_FORMAT_VAR) {
            Ok(raw) => raw.parse().map_err(|details| LogConfigError::ParseError {
                key: LOG_FORMAT_VAR.to_string(),
                details,
            })?,
            Err(_) => LogFormat::default(),
        };
        Ok(Self {
            format,
            ..Self::default()
        })
    }
}

/// Install the global subscriber.
///
/// Safe to call multiple times: returns `false` when a subscriber was already
/// installed (common in tests) and leaves it in place.
pub fn init(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_target(true)
            .try_init(),
    };

    match result {
        Ok(()) => {
            tracing::debug!(format = ?config.format, "tracing initialized");
            true
        }
        Err(_) => false,
    }
}
