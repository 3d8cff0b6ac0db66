use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, InventoryId, ProductId, Sku};

use crate::movement::MovementKind;

/// On-hand and reserved units for one record.
///
/// `available` is always derived; the only way to a new balance is
/// [`StockBalance::apply`], which refuses any change that would break
/// `0 <= reserved <= quantity`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBalance")]
pub struct StockBalance {
    quantity: u64,
    reserved: u64,
}

#[derive(Deserialize)]
struct RawBalance {
    quantity: u64,
    reserved: u64,
}

impl TryFrom<RawBalance> for StockBalance {
    type Error = DomainError;

    fn try_from(raw: RawBalance) -> Result<Self, Self::Error> {
        StockBalance::new(raw.quantity, raw.reserved)
    }
}

impl StockBalance {
    pub fn new(quantity: u64, reserved: u64) -> DomainResult<Self> {
        if reserved > quantity {
            return Err(DomainError::invalid_input(format!(
                "reserved ({reserved}) cannot exceed quantity ({quantity})"
            )));
        }
        Ok(Self { quantity, reserved })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn available(&self) -> u64 {
        self.quantity - self.reserved
    }

    /// Balance after `kind`, or `None` if the change is not representable.
    pub fn apply(&self, kind: &MovementKind) -> Option<Self> {
        let (quantity, reserved) = match kind {
            MovementKind::In { quantity, .. } => (self.quantity.checked_add(*quantity)?, self.reserved),
            MovementKind::Out { quantity, .. } => (self.quantity.checked_sub(*quantity)?, self.reserved),
            MovementKind::Adjustment { delta, .. } => {
                let quantity = if *delta >= 0 {
                    self.quantity.checked_add(delta.unsigned_abs())?
                } else {
                    self.quantity.checked_sub(delta.unsigned_abs())?
                };
                (quantity, self.reserved)
            }
            MovementKind::Reserve { quantity, .. } => (self.quantity, self.reserved.checked_add(*quantity)?),
            MovementKind::Release { quantity, .. } => (self.quantity, self.reserved.checked_sub(*quantity)?),
        };

        if reserved > quantity {
            return None;
        }
        Some(Self { quantity, reserved })
    }
}

/// Read-only `{quantity, reserved, available}` snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub quantity: u64,
    pub reserved: u64,
    pub available: u64,
}

impl From<StockBalance> for Availability {
    fn from(balance: StockBalance) -> Self {
        Self {
            quantity: balance.quantity(),
            reserved: balance.reserved(),
            available: balance.available(),
        }
    }
}

/// Current-state projection of one product's stock.
///
/// Immutable snapshot: stores produce a new value per committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub(crate) id: InventoryId,
    product_id: ProductId,
    sku: Sku,
    #[serde(flatten)]
    balance: StockBalance,
    min_stock: u64,
    reorder_point: u64,
    location: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Column values used by stores to rebuild a record they persisted.
#[derive(Debug, Clone)]
pub struct RecordParts {
    pub id: InventoryId,
    pub product_id: ProductId,
    pub sku: Sku,
    pub quantity: u64,
    pub reserved: u64,
    pub min_stock: u64,
    pub reorder_point: u64,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// A freshly created record: nothing reserved yet.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: InventoryId,
        product_id: ProductId,
        sku: Sku,
        quantity: u64,
        min_stock: u64,
        reorder_point: u64,
        location: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            sku,
            balance: StockBalance {
                quantity,
                reserved: 0,
            },
            min_stock,
            reorder_point,
            location,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rebuild a persisted record, re-checking the balance invariant.
    pub fn from_parts(parts: RecordParts) -> DomainResult<Self> {
        Ok(Self {
            id: parts.id,
            product_id: parts.product_id,
            sku: parts.sku,
            balance: StockBalance::new(parts.quantity, parts.reserved)?,
            min_stock: parts.min_stock,
            reorder_point: parts.reorder_point,
            location: parts.location,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        })
    }

    pub fn id(&self) -> InventoryId {
        self.id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn balance(&self) -> StockBalance {
        self.balance
    }

    pub fn quantity(&self) -> u64 {
        self.balance.quantity()
    }

    pub fn reserved(&self) -> u64 {
        self.balance.reserved()
    }

    pub fn available(&self) -> u64 {
        self.balance.available()
    }

    pub fn availability(&self) -> Availability {
        self.balance.into()
    }

    pub fn min_stock(&self) -> u64 {
        self.min_stock
    }

    pub fn reorder_point(&self) -> u64 {
        self.reorder_point
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set_balance(&mut self, balance: StockBalance) {
        self.balance = balance;
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}
