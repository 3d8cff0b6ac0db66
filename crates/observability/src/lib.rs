//! Tracing/logging setup shared by ledger binaries and tests.

pub mod subscriber;

pub use subscriber::{LogConfig, LogConfigError, LogFormat, init};
