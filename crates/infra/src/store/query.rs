//! Movement log pagination.
//!
//! Movements are listed newest first. Paging is keyed on the per-record
//! sequence number, so a cursor stays valid while new movements are appended.

use serde::{Deserialize, Serialize};

use stockledger_inventory::Movement;

/// Opaque resume point: continue with movements older than `before`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementCursor {
    pub before: u64,
}

/// Caller-facing page request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of movements to return (defaulted and capped by config).
    pub limit: Option<u32>,
    /// Resume after a previous page.
    pub cursor: Option<MovementCursor>,
}

impl Pagination {
    pub fn new(limit: Option<u32>, cursor: Option<MovementCursor>) -> Self {
        Self { limit, cursor }
    }

    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    /// Resolve into a store query: missing or zero limits fall back to `default_limit`,
    /// everything is capped at `max_limit`.
    pub fn resolve(&self, default_limit: u32, max_limit: u32) -> MovementQuery {
        let limit = match self.limit {
            Some(0) | None => default_limit,
            Some(n) => n,
        };
        MovementQuery {
            limit: limit.min(max_limit).max(1),
            before: self.cursor.map(|c| c.before),
        }
    }
}

/// Store-level query: up to `limit` movements with `sequence < before`, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementQuery {
    pub limit: u32,
    pub before: Option<u64>,
}

impl MovementQuery {
    pub fn matches(&self, sequence: u64) -> bool {
        self.before.is_none_or(|before| sequence < before)
    }
}

/// One page of movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub movements: Vec<Movement>,
    /// Present when older movements remain.
    pub next: Option<MovementCursor>,
}

impl MovementPage {
    /// Build a page from a store result. Sequences are contiguous from 1, so
    /// older movements exist exactly when the oldest one returned is above 1.
    pub fn from_movements(movements: Vec<Movement>) -> Self {
        let next = movements
            .last()
            .filter(|m| m.sequence > 1)
            .map(|m| MovementCursor { before: m.sequence });
        Self { movements, next }
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }
}
