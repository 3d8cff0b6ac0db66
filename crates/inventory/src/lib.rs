//! Inventory ledger domain.
//!
//! Stock accounting rules implemented as deterministic domain logic (no IO, no
//! storage): the record snapshot, the movement sum type, the position aggregate
//! that decides movements, alert evaluation and movement replay.

pub mod alert;
pub mod command;
pub mod event;
pub mod movement;
pub mod position;
pub mod record;
pub mod replay;

pub use alert::{AlertLevel, StockAlert, evaluate, is_low_stock, needs_reorder};
pub use command::{
    AdjustStock, AdjustmentType, CreateInventory, ReleaseStock, ReserveStock, StockAdjustment,
    StockCommand,
};
pub use event::{
    InventoryCreated, LowStockAlert, StockAdjusted, StockEvent, StockReleased,
    StockReservationFailed, StockReserved,
};
pub use movement::{Movement, MovementKind, MovementType};
pub use position::StockPosition;
pub use record::{Availability, InventoryRecord, RecordParts, StockBalance};
pub use replay::{ReplayError, ReplayedBalance, replay};
