use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryId, OrderId, ProductId, Sku};
use stockledger_events::Event;

use crate::alert::{AlertLevel, StockAlert};
use crate::movement::MovementType;
use crate::record::InventoryRecord;

/// Event: InventoryCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCreated {
    pub inventory_id: InventoryId,
    pub product_id: ProductId,
    pub sku: Sku,
    pub quantity: u64,
    pub min_stock: u64,
    pub reorder_point: u64,
    pub available_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub product_id: ProductId,
    pub sku: Sku,
    pub order_id: OrderId,
    pub quantity: u64,
    pub reserved_before: u64,
    pub reserved_after: u64,
    pub available_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub product_id: ProductId,
    pub sku: Sku,
    pub order_id: OrderId,
    pub quantity: u64,
    pub reserved_before: u64,
    pub reserved_after: u64,
    pub available_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub sku: Sku,
    pub movement_type: MovementType,
    pub delta: i64,
    pub reason: String,
    pub quantity_before: u64,
    pub quantity_after: u64,
    pub available_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReservationFailed (nothing was reserved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReservationFailed {
    pub product_id: ProductId,
    pub sku: Sku,
    pub order_id: OrderId,
    pub requested: u64,
    pub available_stock: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LowStockAlert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub sku: Sku,
    pub level: AlertLevel,
    pub available_stock: u64,
    pub min_stock: u64,
    pub reorder_point: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    InventoryCreated(InventoryCreated),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    StockAdjusted(StockAdjusted),
    StockReservationFailed(StockReservationFailed),
    LowStockAlert(LowStockAlert),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::InventoryCreated(_) => "inventory.record.created",
            StockEvent::StockReserved(_) => "inventory.stock.reserved",
            StockEvent::StockReleased(_) => "inventory.stock.released",
            StockEvent::StockAdjusted(_) => "inventory.stock.adjusted",
            StockEvent::StockReservationFailed(_) => "inventory.stock.reservation_failed",
            StockEvent::LowStockAlert(_) => "inventory.stock.low_stock_alert",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::InventoryCreated(e) => e.occurred_at,
            StockEvent::StockReserved(e) => e.occurred_at,
            StockEvent::StockReleased(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
            StockEvent::StockReservationFailed(e) => e.occurred_at,
            StockEvent::LowStockAlert(e) => e.occurred_at,
        }
    }
}

impl StockEvent {
    pub fn created(record: &InventoryRecord) -> Self {
        StockEvent::InventoryCreated(InventoryCreated {
            inventory_id: record.id(),
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            quantity: record.quantity(),
            min_stock: record.min_stock(),
            reorder_point: record.reorder_point(),
            available_stock: record.available(),
            occurred_at: record.created_at(),
        })
    }

    pub fn reserved(
        before: &InventoryRecord,
        after: &InventoryRecord,
        order_id: &OrderId,
        quantity: u64,
    ) -> Self {
        StockEvent::StockReserved(StockReserved {
            product_id: after.product_id().clone(),
            sku: after.sku().clone(),
            order_id: order_id.clone(),
            quantity,
            reserved_before: before.reserved(),
            reserved_after: after.reserved(),
            available_stock: after.available(),
            occurred_at: after.updated_at(),
        })
    }

    pub fn released(
        before: &InventoryRecord,
        after: &InventoryRecord,
        order_id: &OrderId,
        quantity: u64,
    ) -> Self {
        StockEvent::StockReleased(StockReleased {
            product_id: after.product_id().clone(),
            sku: after.sku().clone(),
            order_id: order_id.clone(),
            quantity,
            reserved_before: before.reserved(),
            reserved_after: after.reserved(),
            available_stock: after.available(),
            occurred_at: after.updated_at(),
        })
    }

    pub fn adjusted(
        before: &InventoryRecord,
        after: &InventoryRecord,
        movement_type: MovementType,
        delta: i64,
        reason: &str,
    ) -> Self {
        StockEvent::StockAdjusted(StockAdjusted {
            product_id: after.product_id().clone(),
            sku: after.sku().clone(),
            movement_type,
            delta,
            reason: reason.to_string(),
            quantity_before: before.quantity(),
            quantity_after: after.quantity(),
            available_stock: after.available(),
            occurred_at: after.updated_at(),
        })
    }

    pub fn reservation_failed(
        record: &InventoryRecord,
        order_id: &OrderId,
        requested: u64,
        available: u64,
        at: DateTime<Utc>,
    ) -> Self {
        StockEvent::StockReservationFailed(StockReservationFailed {
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            order_id: order_id.clone(),
            requested,
            available_stock: available,
            occurred_at: at,
        })
    }

    pub fn low_stock(record: &InventoryRecord, alert: &StockAlert) -> Self {
        StockEvent::LowStockAlert(LowStockAlert {
            product_id: record.product_id().clone(),
            sku: record.sku().clone(),
            level: alert.level,
            available_stock: alert.available,
            min_stock: alert.min_stock,
            reorder_point: alert.reorder_point,
            occurred_at: record.updated_at(),
        })
    }

    pub fn product_id(&self) -> &ProductId {
        match self {
            StockEvent::InventoryCreated(e) => &e.product_id,
            StockEvent::StockReserved(e) => &e.product_id,
            StockEvent::StockReleased(e) => &e.product_id,
            StockEvent::StockAdjusted(e) => &e.product_id,
            StockEvent::StockReservationFailed(e) => &e.product_id,
            StockEvent::LowStockAlert(e) => &e.product_id,
        }
    }

    pub fn available_stock(&self) -> u64 {
        match self {
            StockEvent::InventoryCreated(e) => e.available_stock,
            StockEvent::StockReserved(e) => e.available_stock,
            StockEvent::StockReleased(e) => e.available_stock,
            StockEvent::StockAdjusted(e) => e.available_stock,
            StockEvent::StockReservationFailed(e) => e.available_stock,
            StockEvent::LowStockAlert(e) => e.available_stock,
        }
    }
}
