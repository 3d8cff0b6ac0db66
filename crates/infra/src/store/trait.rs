use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockledger_core::{AggregateRoot, DomainError, InventoryId, MovementId, ProductId};
use stockledger_inventory::{InventoryRecord, Movement, MovementKind, StockPosition};

use super::query::MovementQuery;

/// Decision callback run inside a store transaction.
///
/// Receives the freshly read position and returns the movements to record. An
/// empty vector commits nothing; an error rolls the transaction back.
pub type Decide<'a> = dyn FnMut(&StockPosition) -> Result<Vec<MovementKind>, DomainError> + 'a;

/// Outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub before: StockPosition,
    pub after: StockPosition,
    /// Movements appended by this transaction, in sequence order.
    pub movements: Vec<Movement>,
}

impl Committed {
    /// Nothing was written (e.g. a retried reservation).
    pub fn is_noop(&self) -> bool {
        self.movements.is_empty()
    }
}

/// Store operation error.
///
/// `Conflict` and `Unavailable` are transient; the rest are permanent for the
/// same input.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("inventory record not found")]
    NotFound,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The decision callback refused the change; nothing was written.
    #[error(transparent)]
    Rejected(DomainError),

    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt store state: {0}")]
    Corrupt(String),
}

/// Durable record store with transactional read-modify-write per record.
///
/// ## Implementation requirements
///
/// - `transact` reads the current position, runs `decide`, writes the new
///   record state and appends the movements atomically; no other `transact`
///   on the same product may interleave
/// - operations on different products must not block each other
/// - the movement log is append-only: sequences start at 1 and never repeat
/// - no automatic retries; lost races surface as `Conflict`, timeouts as `Unavailable`
pub trait StockStore: Send + Sync {
    /// Insert a new record together with its opening movements.
    ///
    /// Fails with `AlreadyExists` when the product id or sku is taken.
    fn insert(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError>;

    /// Read the current position (no lock held afterwards).
    fn load(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError>;

    /// Serializable read → decide → write → append for one product.
    fn transact(
        &self,
        product_id: &ProductId,
        at: DateTime<Utc>,
        decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError>;

    /// Movements of one record, newest first.
    fn movements(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn insert(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError> {
        (**self).insert(record, opening)
    }

    fn load(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError> {
        (**self).load(product_id)
    }

    fn transact(
        &self,
        product_id: &ProductId,
        at: DateTime<Utc>,
        decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError> {
        (**self).transact(product_id, at, decide)
    }

    fn movements(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError> {
        (**self).movements(inventory_id, query)
    }
}

/// Turn decided movement kinds into log entries and the resulting position.
///
/// Sequences continue from `position.version()`. Timestamps never go backwards
/// relative to the record's last update, so `created_at` stays monotonic even
/// if the wall clock does not.
pub fn stage_movements(
    position: &StockPosition,
    kinds: Vec<MovementKind>,
    at: DateTime<Utc>,
) -> Result<(StockPosition, Vec<Movement>), StoreError> {
    let created_at = at.max(position.record().updated_at());
    let mut next = position.clone();
    let mut movements = Vec::with_capacity(kinds.len());

    for kind in kinds {
        if next.record().balance().apply(&kind).is_none() {
            return Err(StoreError::Rejected(DomainError::invalid_operation(format!(
                "{} movement would break the stock balance",
                kind.movement_type()
            ))));
        }
        next.apply_at(&kind, created_at);
        movements.push(Movement {
            id: MovementId::new(),
            inventory_id: next.inventory_id(),
            sequence: next.version(),
            kind,
            created_at,
        });
    }

    Ok((next, movements))
}

/// Apply a decision to a position without persisting anything.
///
/// Shared by store implementations: runs `decide`, stages the result.
pub(crate) fn decide_and_stage(
    position: &StockPosition,
    at: DateTime<Utc>,
    decide: &mut Decide<'_>,
) -> Result<(StockPosition, Vec<Movement>), StoreError> {
    let kinds = decide(position).map_err(StoreError::Rejected)?;
    stage_movements(position, kinds, at)
}
