//! Stock ledger engine.
//!
//! Every mutation runs through one store transaction scoped to a single product:
//!
//! ```text
//! Command
//!   ↓
//! 1. Validate (pure, before any IO)
//!   ↓
//! 2. Store transaction: lock row → read position → decide movements → write record + append log
//!   ↓
//! 3. Publish the domain event (after commit, best effort)
//!   ↓
//! 4. Evaluate alerts on the committed record, publish LowStockAlert if any
//! ```
//!
//! Nothing is retried here. Lost races surface as `Conflict`, store timeouts as
//! `Unavailable`; both are safe for the caller to re-issue.

mod error;
mod response;
mod stream;

pub use error::LedgerError;
pub use response::{AdjustmentOutcome, ReleaseOutcome, ReservationOutcome, StockResponse};
pub use stream::MovementStream;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, EventId, InventoryId, ProductId,
};
use stockledger_events::{Event, EventBus, EventEnvelope};
use stockledger_inventory::{
    AdjustStock, Availability, CreateInventory, InventoryRecord, MovementKind, ReleaseStock,
    ReplayedBalance, ReserveStock, StockEvent, StockPosition, evaluate, replay,
};

use crate::config::LedgerConfig;
use crate::store::{MovementCursor, MovementPage, Pagination, StockStore, StoreError};

/// Reason recorded on the opening `IN` movement of a new record.
pub const INITIAL_STOCK_REASON: &str = "initial stock";

/// Transactional stock engine over a [`StockStore`] and an [`EventBus`].
#[derive(Debug)]
pub struct StockLedger<S, B> {
    store: S,
    bus: B,
    config: LedgerConfig,
}

impl<S, B> StockLedger<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::with_config(store, bus, LedgerConfig::default())
    }

    pub fn with_config(store: S, bus: B, config: LedgerConfig) -> Self {
        Self { store, bus, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> StockLedger<S, B>
where
    S: StockStore,
    B: EventBus<EventEnvelope<StockEvent>>,
{
    /// Create the record for a product. Initial stock is written as an opening
    /// `IN` movement so the log alone reproduces the record.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, sku = %command.sku),
        err
    )]
    pub fn create_inventory(&self, command: CreateInventory) -> Result<InventoryRecord, LedgerError> {
        let (quantity, min_stock, reorder_point, location) = command.validate()?;

        let record = InventoryRecord::open(
            InventoryId::new(),
            command.product_id,
            command.sku,
            0,
            min_stock,
            reorder_point,
            location,
            Utc::now(),
        );
        let opening = if quantity > 0 {
            vec![MovementKind::In {
                quantity,
                reason: INITIAL_STOCK_REASON.to_string(),
            }]
        } else {
            Vec::new()
        };

        let committed = self.store.insert(record, opening)?;
        let position = committed.after;

        info!(
            inventory_id = %position.inventory_id(),
            quantity = position.record().quantity(),
            "inventory record created"
        );

        self.publish(&position, StockEvent::created(position.record()));
        self.raise_alert(&position);

        Ok(position.into_record())
    }

    /// Reserve stock for an order.
    ///
    /// A retry for an order that still holds a reservation returns the existing
    /// reservation (`replayed = true`) without writing or publishing anything.
    /// On `InsufficientStock` nothing is applied and `StockReservationFailed`
    /// is published with the availability the transaction observed.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, order_id = %command.order_id, quantity = command.quantity),
        err
    )]
    pub fn reserve_stock(&self, command: ReserveStock) -> Result<ReservationOutcome, LedgerError> {
        let decision = command.validate()?;
        let now = Utc::now();

        let mut observed: Option<StockPosition> = None;
        let result = self.store.transact(&command.product_id, now, &mut |position: &StockPosition| {
            observed = Some(position.clone());
            position.handle(&decision)
        });

        let committed = match result {
            Ok(committed) => committed,
            Err(StoreError::Rejected(DomainError::InsufficientStock {
                requested,
                available,
            })) => {
                warn!(requested, available, "reservation rejected: insufficient stock");
                if let Some(position) = &observed {
                    self.publish(
                        position,
                        StockEvent::reservation_failed(
                            position.record(),
                            &command.order_id,
                            requested,
                            available,
                            now,
                        ),
                    );
                }
                return Err(LedgerError::InsufficientStock {
                    requested,
                    available,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let after = &committed.after;
        let record = after.record();
        let outcome = ReservationOutcome {
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            order_id: command.order_id.clone(),
            quantity: after.reserved_for(&command.order_id),
            on_hand: record.quantity(),
            reserved: record.reserved(),
            available: record.available(),
            replayed: committed.is_noop(),
        };

        if outcome.replayed {
            info!(held = outcome.quantity, "reservation already held, nothing written");
            return Ok(outcome);
        }

        info!(available = outcome.available, reserved = outcome.reserved, "stock reserved");
        self.publish(
            after,
            StockEvent::reserved(
                committed.before.record(),
                record,
                &command.order_id,
                record.reserved() - committed.before.record().reserved(),
            ),
        );
        self.raise_alert(after);

        Ok(outcome)
    }

    /// Release part or all of an order's reservation.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, order_id = %command.order_id, quantity = command.quantity),
        err
    )]
    pub fn release_stock(&self, command: ReleaseStock) -> Result<ReleaseOutcome, LedgerError> {
        let decision = command.validate()?;

        let committed = self.store.transact(
            &command.product_id,
            Utc::now(),
            &mut |position: &StockPosition| position.handle(&decision),
        )?;

        let before = committed.before.record();
        let after = &committed.after;
        let record = after.record();
        let released = before.reserved() - record.reserved();

        let outcome = ReleaseOutcome {
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            order_id: command.order_id.clone(),
            released,
            remaining: after.reserved_for(&command.order_id),
            on_hand: record.quantity(),
            reserved: record.reserved(),
            available: record.available(),
        };

        info!(released, available = outcome.available, "stock released");
        self.publish(
            after,
            StockEvent::released(before, record, &command.order_id, released),
        );
        self.raise_alert(after);

        Ok(outcome)
    }

    /// Apply an `IN`, `OUT` or `ADJUSTMENT` change to on-hand quantity.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, adjustment = ?command.adjustment_type, quantity = command.quantity),
        err
    )]
    pub fn adjust_stock(&self, command: AdjustStock) -> Result<AdjustmentOutcome, LedgerError> {
        let decision = command.validate()?;

        let committed = self.store.transact(
            &command.product_id,
            Utc::now(),
            &mut |position: &StockPosition| position.handle(&decision),
        )?;

        let Some(movement) = committed.movements.first() else {
            return Err(LedgerError::Corrupt(
                "adjustment committed without a movement".to_string(),
            ));
        };

        let before = committed.before.record();
        let after = &committed.after;
        let record = after.record();
        let outcome = AdjustmentOutcome {
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            movement_type: movement.movement_type(),
            delta: movement.delta(),
            previous_quantity: before.quantity(),
            new_quantity: record.quantity(),
            reserved: record.reserved(),
            available: record.available(),
        };

        info!(
            movement_type = %outcome.movement_type,
            previous = outcome.previous_quantity,
            new = outcome.new_quantity,
            "stock adjusted"
        );
        self.publish(
            after,
            StockEvent::adjusted(
                before,
                record,
                outcome.movement_type,
                outcome.delta,
                movement.kind.reason().unwrap_or_default(),
            ),
        );
        self.raise_alert(after);

        Ok(outcome)
    }

    /// Read-only `{quantity, reserved, available}` snapshot.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn get_availability(&self, product_id: &ProductId) -> Result<Availability, LedgerError> {
        Ok(self.position(product_id)?.record().availability())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn get_inventory(&self, product_id: &ProductId) -> Result<InventoryRecord, LedgerError> {
        Ok(self.position(product_id)?.into_record())
    }

    /// One page of movements, newest first.
    #[instrument(skip(self, pagination), fields(product_id = %product_id), err)]
    pub fn list_movements(
        &self,
        product_id: &ProductId,
        pagination: Pagination,
    ) -> Result<MovementPage, LedgerError> {
        let inventory_id = self.position(product_id)?.inventory_id();
        let query = pagination.resolve(self.config.default_page_size, self.config.max_page_size);
        let movements = self.store.movements(inventory_id, query)?;
        debug!(returned = movements.len(), "movements listed");
        Ok(MovementPage::from_movements(movements))
    }

    /// Lazy newest-first stream over the whole movement log.
    pub fn movements(&self, product_id: &ProductId) -> Result<MovementStream<'_, S>, LedgerError> {
        self.movements_from(product_id, None)
    }

    /// Resume a stream from a cursor obtained from [`MovementStream::cursor`]
    /// or [`MovementPage::next`].
    pub fn movements_from(
        &self,
        product_id: &ProductId,
        cursor: Option<MovementCursor>,
    ) -> Result<MovementStream<'_, S>, LedgerError> {
        let inventory_id = self.position(product_id)?.inventory_id();
        Ok(MovementStream::new(
            &self.store,
            inventory_id,
            self.config.default_page_size,
            cursor,
        ))
    }

    /// Replay the movement log from zero and compare it with the live record.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub fn verify_consistency(&self, product_id: &ProductId) -> Result<ReplayedBalance, LedgerError> {
        let position = self.position(product_id)?;
        let inventory_id = position.inventory_id();

        // Only movements up to the loaded version; later appends belong to a newer state.
        let cursor = MovementCursor {
            before: position.version() + 1,
        };
        let movements = MovementStream::new(&self.store, inventory_id, self.config.max_page_size, Some(cursor))
            .collect::<Result<Vec<_>, _>>()?;

        let replayed = replay(inventory_id, &movements)?;
        if let Err(drift) = replayed.verify(&position) {
            error!(inventory_id = %inventory_id, error = %drift, "movement log drifted from record");
            return Err(drift.into());
        }

        debug!(version = replayed.version, "replay matches live record");
        Ok(replayed)
    }

    fn position(&self, product_id: &ProductId) -> Result<StockPosition, LedgerError> {
        self.store.load(product_id)?.ok_or(LedgerError::NotFound)
    }

    fn raise_alert(&self, position: &StockPosition) {
        let Some(alert) = evaluate(position.record()) else {
            return;
        };
        info!(
            level = alert.level.as_str(),
            available = alert.available,
            min_stock = alert.min_stock,
            reorder_point = alert.reorder_point,
            "stock alert"
        );
        self.publish(position, StockEvent::low_stock(position.record(), &alert));
    }

    /// Best effort: the change is already committed, so a bus failure is only logged.
    fn publish(&self, position: &StockPosition, event: StockEvent) {
        let event_type = event.event_type();
        let envelope = EventEnvelope::wrap(
            EventId::new(),
            position.inventory_id(),
            position.version(),
            event,
        );
        if let Err(err) = self.bus.publish(envelope) {
            warn!(event_type, error = %err, "event publication failed after commit");
        }
    }
}
