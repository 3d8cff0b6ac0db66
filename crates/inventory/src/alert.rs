//! Low/critical stock evaluation.
//!
//! Pure functions over an [`InventoryRecord`] snapshot. The ledger evaluates a
//! record once per committed mutation; deduplicating repeated alerts is left to
//! downstream consumers.

use serde::{Deserialize, Serialize};

use crate::record::InventoryRecord;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    #[serde(rename = "CRITICAL_STOCK")]
    Critical,
    #[serde(rename = "LOW_STOCK")]
    Low,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Critical => "CRITICAL_STOCK",
            AlertLevel::Low => "LOW_STOCK",
        }
    }
}

/// Alert derived from one record snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAlert {
    pub level: AlertLevel,
    pub available: u64,
    pub min_stock: u64,
    pub reorder_point: u64,
}

/// `available <= reorder_point / 2` is critical; otherwise `available <= min_stock` is low.
pub fn evaluate(record: &InventoryRecord) -> Option<StockAlert> {
    let available = record.available();

    let level = if available <= record.reorder_point() / 2 {
        AlertLevel::Critical
    } else if is_low_stock(record) {
        AlertLevel::Low
    } else {
        return None;
    };

    Some(StockAlert {
        level,
        available,
        min_stock: record.min_stock(),
        reorder_point: record.reorder_point(),
    })
}

pub fn is_low_stock(record: &InventoryRecord) -> bool {
    record.available() <= record.min_stock()
}

/// Replenishment should be triggered.
pub fn needs_reorder(record: &InventoryRecord) -> bool {
    record.available() <= record.reorder_point()
}
