//! Caller-facing results of ledger operations.

use serde::{Deserialize, Serialize};

use stockledger_core::{OrderId, ProductId, Sku};
use stockledger_inventory::{InventoryRecord, MovementType};

use super::error::LedgerError;

/// Result of `reserve_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub product_id: ProductId,
    pub sku: Sku,
    pub order_id: OrderId,
    /// Units held for the order after the call.
    pub quantity: u64,
    pub on_hand: u64,
    pub reserved: u64,
    pub available: u64,
    /// The order already held a reservation; nothing new was written.
    pub replayed: bool,
}

/// Result of `release_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub product_id: ProductId,
    pub sku: Sku,
    pub order_id: OrderId,
    pub released: u64,
    /// Units the order still holds.
    pub remaining: u64,
    pub on_hand: u64,
    pub reserved: u64,
    pub available: u64,
}

/// Result of `adjust_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub product_id: ProductId,
    pub sku: Sku,
    pub movement_type: MovementType,
    pub delta: i64,
    pub previous_quantity: u64,
    pub new_quantity: u64,
    pub reserved: u64,
    pub available: u64,
}

/// Flat response shape shared by all stock operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockResponse {
    pub success: bool,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_before: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
}

impl StockResponse {
    fn succeeded(
        product_id: &ProductId,
        sku: &Sku,
        quantity: (u64, u64),
        reserved: u64,
        available: u64,
        message: String,
    ) -> Self {
        Self {
            success: true,
            product_id: product_id.clone(),
            sku: Some(sku.clone()),
            quantity_before: Some(quantity.0),
            quantity_after: Some(quantity.1),
            reserved: Some(reserved),
            available: Some(available),
            error_code: None,
            message,
        }
    }

    /// Failure response. `InsufficientStock` still reports the observed availability.
    pub fn failure(product_id: &ProductId, error: &LedgerError) -> Self {
        let available = match error {
            LedgerError::InsufficientStock { available, .. } => Some(*available),
            _ => None,
        };
        Self {
            success: false,
            product_id: product_id.clone(),
            sku: None,
            quantity_before: None,
            quantity_after: None,
            reserved: None,
            available,
            error_code: Some(error.code().to_string()),
            message: error.to_string(),
        }
    }

    pub fn created(record: &InventoryRecord) -> Self {
        Self::succeeded(
            record.product_id(),
            record.sku(),
            (0, record.quantity()),
            record.reserved(),
            record.available(),
            format!("inventory created for sku {}", record.sku()),
        )
    }
}

impl ReservationOutcome {
    pub fn to_response(&self) -> StockResponse {
        let message = if self.replayed {
            format!(
                "order {} already holds {} units",
                self.order_id, self.quantity
            )
        } else {
            format!("reserved {} units for order {}", self.quantity, self.order_id)
        };
        StockResponse::succeeded(
            &self.product_id,
            &self.sku,
            (self.on_hand, self.on_hand),
            self.reserved,
            self.available,
            message,
        )
    }
}

impl ReleaseOutcome {
    pub fn to_response(&self) -> StockResponse {
        StockResponse::succeeded(
            &self.product_id,
            &self.sku,
            (self.on_hand, self.on_hand),
            self.reserved,
            self.available,
            format!("released {} units for order {}", self.released, self.order_id),
        )
    }
}

impl AdjustmentOutcome {
    pub fn to_response(&self) -> StockResponse {
        StockResponse::succeeded(
            &self.product_id,
            &self.sku,
            (self.previous_quantity, self.new_quantity),
            self.reserved,
            self.available,
            format!(
                "{} adjustment: {} -> {}",
                self.movement_type, self.previous_quantity, self.new_quantity
            ),
        )
    }
}
