//! Rebuild stock balances from the movement log.
//!
//! Replaying every movement of one inventory record from an empty balance must
//! reproduce the live record exactly; anything else is drift.

use std::collections::BTreeMap;

use thiserror::Error;

use stockledger_core::{AggregateRoot, InventoryId, OrderId};

use crate::movement::{Movement, MovementKind};
use crate::position::StockPosition;
use crate::record::StockBalance;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("movement {sequence} belongs to inventory {found}, expected {expected}")]
    ForeignMovement {
        expected: InventoryId,
        found: InventoryId,
        sequence: u64,
    },

    #[error("movement sequence gap (expected {expected}, found {found})")]
    SequenceGap { expected: u64, found: u64 },

    #[error("movement {sequence} breaks the balance invariant")]
    InvariantBroken { sequence: u64 },

    #[error("replayed {replayed:?} (v{replayed_version}) but live record holds {live:?} (v{live_version})")]
    Drift {
        replayed: StockBalance,
        replayed_version: u64,
        live: StockBalance,
        live_version: u64,
    },
}

/// Result of replaying one inventory record's movements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayedBalance {
    pub balance: StockBalance,
    pub reservations: BTreeMap<OrderId, u64>,
    pub version: u64,
}

impl ReplayedBalance {
    /// Compare against the live position; balance, open reservations and version must all match.
    pub fn verify(&self, live: &StockPosition) -> Result<(), ReplayError> {
        let live_balance = live.record().balance();
        if self.balance != live_balance
            || &self.reservations != live.reservations()
            || self.version != live.version()
        {
            return Err(ReplayError::Drift {
                replayed: self.balance,
                replayed_version: self.version,
                live: live_balance,
                live_version: live.version(),
            });
        }
        Ok(())
    }
}

/// Replay movements of `inventory_id` in sequence order (input order does not matter).
pub fn replay<'a>(
    inventory_id: InventoryId,
    movements: impl IntoIterator<Item = &'a Movement>,
) -> Result<ReplayedBalance, ReplayError> {
    let mut ordered: Vec<&Movement> = movements.into_iter().collect();
    ordered.sort_by_key(|m| m.sequence);

    let mut state = ReplayedBalance::default();
    for movement in ordered {
        if movement.inventory_id != inventory_id {
            return Err(ReplayError::ForeignMovement {
                expected: inventory_id,
                found: movement.inventory_id,
                sequence: movement.sequence,
            });
        }
        let expected = state.version + 1;
        if movement.sequence != expected {
            return Err(ReplayError::SequenceGap {
                expected,
                found: movement.sequence,
            });
        }

        state.balance = state
            .balance
            .apply(&movement.kind)
            .ok_or(ReplayError::InvariantBroken {
                sequence: movement.sequence,
            })?;

        match &movement.kind {
            MovementKind::Reserve { quantity, order_id } => {
                *state.reservations.entry(order_id.clone()).or_default() += quantity;
            }
            MovementKind::Release { quantity, order_id } => {
                let held = state.reservations.get(order_id).copied().unwrap_or(0);
                if *quantity > held {
                    return Err(ReplayError::InvariantBroken {
                        sequence: movement.sequence,
                    });
                }
                if held == *quantity {
                    state.reservations.remove(order_id);
                } else {
                    state.reservations.insert(order_id.clone(), held - quantity);
                }
            }
            _ => {}
        }

        state.version = movement.sequence;
    }

    Ok(state)
}
