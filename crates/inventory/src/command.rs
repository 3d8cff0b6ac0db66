//! Commands accepted by the ledger and their validated, typed forms.
//!
//! The public command structs mirror caller input (signed integers, free text).
//! Validation turns them into [`StockCommand`]s whose payloads can no longer be
//! malformed.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, OrderId, ProductId, Sku};

/// Command: CreateInventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInventory {
    pub product_id: ProductId,
    pub sku: Sku,
    pub quantity: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub reorder_point: i64,
    #[serde(default)]
    pub location: Option<String>,
}

impl CreateInventory {
    pub fn new(product_id: ProductId, sku: Sku, quantity: i64) -> Self {
        Self {
            product_id,
            sku,
            quantity,
            min_stock: 0,
            reorder_point: 0,
            location: None,
        }
    }

    pub fn min_stock(mut self, min_stock: i64) -> Self {
        self.min_stock = min_stock;
        self
    }

    pub fn reorder_point(mut self, reorder_point: i64) -> Self {
        self.reorder_point = reorder_point;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Checked `(quantity, min_stock, reorder_point, location)`.
    pub fn validate(&self) -> DomainResult<(u64, u64, u64, Option<String>)> {
        let quantity = non_negative("quantity", self.quantity)?;
        let min_stock = non_negative("minStock", self.min_stock)?;
        let reorder_point = non_negative("reorderPoint", self.reorder_point)?;
        let location = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        Ok((quantity, min_stock, reorder_point, location))
    }
}

/// Command: ReserveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub order_id: OrderId,
}

impl ReserveStock {
    pub fn validate(&self) -> DomainResult<StockCommand> {
        Ok(StockCommand::Reserve {
            quantity: positive("quantity", self.quantity)?,
            order_id: self.order_id.clone(),
        })
    }
}

/// Command: ReleaseStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub order_id: OrderId,
}

impl ReleaseStock {
    pub fn validate(&self) -> DomainResult<StockCommand> {
        Ok(StockCommand::Release {
            quantity: positive("quantity", self.quantity)?,
            order_id: self.order_id.clone(),
        })
    }
}

/// Adjustment type requested by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentType {
    In,
    Out,
    Adjustment,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
    #[serde(rename = "type")]
    pub adjustment_type: AdjustmentType,
}

impl AdjustStock {
    /// `IN` needs a positive quantity, `OUT` takes the magnitude (so `-150`
    /// and `150` both remove 150 units), `ADJUSTMENT` is a signed non-zero delta.
    pub fn validate(&self) -> DomainResult<StockCommand> {
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::invalid_input("reason is required for stock adjustments"));
        }
        let reason = reason.to_string();

        let adjustment = match self.adjustment_type {
            AdjustmentType::In => StockAdjustment::In {
                quantity: positive("quantity", self.quantity)?,
                reason,
            },
            AdjustmentType::Out => {
                if self.quantity == 0 {
                    return Err(DomainError::invalid_input("quantity cannot be zero"));
                }
                StockAdjustment::Out {
                    quantity: self.quantity.unsigned_abs(),
                    reason,
                }
            }
            AdjustmentType::Adjustment => {
                if self.quantity == 0 {
                    return Err(DomainError::invalid_input("adjustment delta cannot be zero"));
                }
                StockAdjustment::Correction {
                    delta: self.quantity,
                    reason,
                }
            }
        };

        Ok(StockCommand::Adjust(adjustment))
    }
}

/// Validated quantity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockAdjustment {
    In { quantity: u64, reason: String },
    Out { quantity: u64, reason: String },
    Correction { delta: i64, reason: String },
}

/// Validated command handled by [`crate::StockPosition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockCommand {
    Reserve { quantity: u64, order_id: OrderId },
    Release { quantity: u64, order_id: OrderId },
    Adjust(StockAdjustment),
}

fn non_negative(field: &str, value: i64) -> DomainResult<u64> {
    u64::try_from(value)
        .map_err(|_| DomainError::invalid_input(format!("{field} cannot be negative")))
}

fn positive(field: &str, value: i64) -> DomainResult<u64> {
    if value <= 0 {
        return Err(DomainError::invalid_input(format!("{field} must be positive")));
    }
    non_negative(field, value)
}
