use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{InventoryId, MovementId, OrderId};

/// Closed set of movement tags as stored and reported.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Reserve,
    Release,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjustment => "ADJUSTMENT",
            MovementType::Reserve => "RESERVE",
            MovementType::Release => "RELEASE",
        }
    }

    /// RESERVE/RELEASE touch `reserved`; everything else touches `quantity`.
    pub fn affects_reserved(&self) -> bool {
        matches!(self, MovementType::Reserve | MovementType::Release)
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = stockledger_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            "RESERVE" => Ok(MovementType::Reserve),
            "RELEASE" => Ok(MovementType::Release),
            other => Err(stockledger_core::DomainError::invalid_input(format!(
                "unknown movement type '{other}'"
            ))),
        }
    }
}

/// What a movement did, with the payload each type requires.
///
/// Quantity movements always carry a reason; reservation movements always
/// carry the order they belong to. Magnitudes are unsigned; [`MovementKind::delta`]
/// gives the signed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    In { quantity: u64, reason: String },
    Out { quantity: u64, reason: String },
    Adjustment { delta: i64, reason: String },
    Reserve { quantity: u64, order_id: OrderId },
    Release { quantity: u64, order_id: OrderId },
}

impl MovementKind {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementKind::In { .. } => MovementType::In,
            MovementKind::Out { .. } => MovementType::Out,
            MovementKind::Adjustment { .. } => MovementType::Adjustment,
            MovementKind::Reserve { .. } => MovementType::Reserve,
            MovementKind::Release { .. } => MovementType::Release,
        }
    }

    /// Signed change applied to `quantity` (IN/OUT/ADJUSTMENT) or `reserved`
    /// (RESERVE/RELEASE).
    pub fn delta(&self) -> i64 {
        match self {
            MovementKind::In { quantity, .. } | MovementKind::Reserve { quantity, .. } => {
                saturating_i64(*quantity)
            }
            MovementKind::Out { quantity, .. } | MovementKind::Release { quantity, .. } => {
                -saturating_i64(*quantity)
            }
            MovementKind::Adjustment { delta, .. } => *delta,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MovementKind::In { reason, .. }
            | MovementKind::Out { reason, .. }
            | MovementKind::Adjustment { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            MovementKind::Reserve { order_id, .. } | MovementKind::Release { order_id, .. } => {
                Some(order_id)
            }
            _ => None,
        }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// One immutable entry of the movement log.
///
/// `sequence` starts at 1 and increases by one per movement of the same
/// inventory record; `created_at` never decreases along the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub inventory_id: InventoryId,
    pub sequence: u64,
    #[serde(flatten)]
    pub kind: MovementKind,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn movement_type(&self) -> MovementType {
        self.kind.movement_type()
    }

    pub fn delta(&self) -> i64 {
        self.kind.delta()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_are_signed_by_direction() {
        let order = OrderId::parse("o-1").unwrap();
        assert_eq!(MovementKind::In { quantity: 3, reason: "po".into() }.delta(), 3);
        assert_eq!(MovementKind::Out { quantity: 3, reason: "sold".into() }.delta(), -3);
        assert_eq!(MovementKind::Adjustment { delta: -2, reason: "count".into() }.delta(), -2);
        assert_eq!(MovementKind::Release { quantity: 5, order_id: order }.delta(), -5);
    }

    #[test]
    fn movement_serializes_with_type_tag() {
        let movement = Movement {
            id: MovementId::new(),
            inventory_id: InventoryId::new(),
            sequence: 4,
            kind: MovementKind::Reserve {
                quantity: 2,
                order_id: OrderId::parse("order-9").unwrap(),
            },
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&movement).unwrap();
        assert_eq!(json["type"], "RESERVE");
        assert_eq!(json["order_id"], "order-9");

        let back: Movement = serde_json::from_value(json).unwrap();
        assert_eq!(back, movement);
    }

    #[test]
    fn movement_type_parses_stored_tags() {
        assert_eq!("ADJUSTMENT".parse::<MovementType>().unwrap(), MovementType::Adjustment);
        assert!("TRANSFER".parse::<MovementType>().is_err());
        assert!(MovementType::Release.affects_reserved());
        assert!(!MovementType::Out.affects_reserved());
    }
}
