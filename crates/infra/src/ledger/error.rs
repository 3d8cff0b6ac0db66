use thiserror::Error;

use stockledger_core::DomainError;
use stockledger_inventory::ReplayError;

use crate::store::StoreError;

/// Typed failure returned by every ledger operation.
///
/// Nothing is retried inside the ledger. `Conflict` and `Unavailable` are
/// transient: the caller may re-issue the same command (with the same order id
/// for reservations). Everything else is permanent for the given input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("inventory record not found")]
    NotFound,

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Persisted state failed to decode or the movement log drifted from the record.
    #[error("corrupt ledger state: {0}")]
    Corrupt(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Conflict(_) | LedgerError::Unavailable(_))
    }

    /// Stable machine-readable code for responses and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::AlreadyExists(_) => "ALREADY_EXISTS",
            LedgerError::NotFound => "NOT_FOUND",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::InvalidOperation(_) => "INVALID_OPERATION",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::Unavailable(_) => "UNAVAILABLE",
            LedgerError::Corrupt(_) => "CORRUPT",
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidInput(msg) => LedgerError::InvalidInput(msg),
            DomainError::AlreadyExists(msg) => LedgerError::AlreadyExists(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::InsufficientStock {
                requested,
                available,
            } => LedgerError::InsufficientStock {
                requested,
                available,
            },
            DomainError::InvalidOperation(msg) => LedgerError::InvalidOperation(msg),
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => LedgerError::NotFound,
            StoreError::AlreadyExists(msg) => LedgerError::AlreadyExists(msg),
            StoreError::Rejected(err) => err.into(),
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::Unavailable(msg) => LedgerError::Unavailable(msg),
            StoreError::Corrupt(msg) => LedgerError::Corrupt(msg),
        }
    }
}

impl From<ReplayError> for LedgerError {
    fn from(value: ReplayError) -> Self {
        LedgerError::Corrupt(value.to_string())
    }
}
