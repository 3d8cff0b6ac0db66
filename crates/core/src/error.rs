//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures that are permanent for a given
/// input. Transient infrastructure failures (timeouts, lost races) belong to the
/// store and ledger layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: negative or zero quantities, blank reasons, empty ids.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record with the same natural key already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The referenced inventory record does not exist.
    #[error("not found")]
    NotFound,

    /// The change would drive available stock below zero.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    /// The change is well formed but not allowed in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A concurrent change won the race for the same record.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_stock(requested: u64, available: u64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
