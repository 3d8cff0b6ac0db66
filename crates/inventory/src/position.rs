use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, DomainResult, InventoryId, OrderId};

use crate::command::{StockAdjustment, StockCommand};
use crate::movement::MovementKind;
use crate::record::InventoryRecord;

/// Aggregate root: one product's stock position.
///
/// The record snapshot plus the open reservation per order. `version` is the
/// sequence number of the last movement applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPosition {
    record: InventoryRecord,
    reservations: BTreeMap<OrderId, u64>,
    version: u64,
}

impl StockPosition {
    /// Position of a record that has no movements yet.
    pub fn open(record: InventoryRecord) -> Self {
        Self {
            record,
            reservations: BTreeMap::new(),
            version: 0,
        }
    }

    /// Rebuild a persisted position. Open reservations must add up to `reserved`.
    pub fn restore(
        record: InventoryRecord,
        reservations: BTreeMap<OrderId, u64>,
        version: u64,
    ) -> DomainResult<Self> {
        let open: u64 = reservations.values().sum();
        if open != record.reserved() {
            return Err(DomainError::invalid_operation(format!(
                "open reservations total {open} but record reserves {}",
                record.reserved()
            )));
        }
        Ok(Self {
            record,
            reservations,
            version,
        })
    }

    pub fn record(&self) -> &InventoryRecord {
        &self.record
    }

    pub fn into_record(self) -> InventoryRecord {
        self.record
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.record.id()
    }

    pub fn reservations(&self) -> &BTreeMap<OrderId, u64> {
        &self.reservations
    }

    /// Units currently held for `order_id` (0 when none).
    pub fn reserved_for(&self, order_id: &OrderId) -> u64 {
        self.reservations.get(order_id).copied().unwrap_or(0)
    }

    /// Apply a committed movement and stamp the record's `updated_at`.
    pub fn apply_at(&mut self, movement: &MovementKind, at: DateTime<Utc>) {
        self.apply(movement);
        self.record.touch(at);
    }

    fn decide_adjust(&self, adjustment: &StockAdjustment) -> DomainResult<MovementKind> {
        let kind = match adjustment {
            StockAdjustment::In { quantity, reason } => MovementKind::In {
                quantity: *quantity,
                reason: reason.clone(),
            },
            StockAdjustment::Out { quantity, reason } => MovementKind::Out {
                quantity: *quantity,
                reason: reason.clone(),
            },
            StockAdjustment::Correction { delta, reason } => MovementKind::Adjustment {
                delta: *delta,
                reason: reason.clone(),
            },
        };

        if self.record.balance().apply(&kind).is_some() {
            return Ok(kind);
        }

        match kind.delta() {
            d if d >= 0 => Err(DomainError::invalid_input("quantity overflow")),
            d => Err(DomainError::insufficient_stock(
                d.unsigned_abs(),
                self.record.available(),
            )),
        }
    }
}

impl AggregateRoot for StockPosition {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.record.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for StockPosition {
    type Command = StockCommand;
    type Event = MovementKind;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        if let Some(next) = self.record.balance().apply(event) {
            self.record.set_balance(next);
        }

        match event {
            MovementKind::Reserve { quantity, order_id } => {
                *self.reservations.entry(order_id.clone()).or_default() += quantity;
            }
            MovementKind::Release { quantity, order_id } => {
                let remaining = self.reserved_for(order_id).saturating_sub(*quantity);
                if remaining == 0 {
                    self.reservations.remove(order_id);
                } else {
                    self.reservations.insert(order_id.clone(), remaining);
                }
            }
            _ => {}
        }

        // Deterministic version tracking: +1 per applied movement.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Reserve { quantity, order_id } => {
                // Retried reservation for an order that already holds stock.
                if self.reservations.contains_key(order_id) {
                    return Ok(vec![]);
                }
                let kind = MovementKind::Reserve {
                    quantity: *quantity,
                    order_id: order_id.clone(),
                };
                if self.record.balance().apply(&kind).is_none() {
                    return Err(DomainError::insufficient_stock(
                        *quantity,
                        self.record.available(),
                    ));
                }
                Ok(vec![kind])
            }
            StockCommand::Release { quantity, order_id } => {
                let held = self.reserved_for(order_id);
                if held == 0 {
                    return Err(DomainError::invalid_operation(format!(
                        "order {order_id} holds no reservation"
                    )));
                }
                if *quantity > held {
                    return Err(DomainError::invalid_operation(format!(
                        "cannot release {quantity} units for order {order_id}: only {held} reserved"
                    )));
                }
                Ok(vec![MovementKind::Release {
                    quantity: *quantity,
                    order_id: order_id.clone(),
                }])
            }
            StockCommand::Adjust(adjustment) => Ok(vec![self.decide_adjust(adjustment)?]),
        }
    }
}
