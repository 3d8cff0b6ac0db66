//! Building blocks shared by the stock ledger crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{EventId, InventoryId, MovementId, OrderId, ProductId, Sku};
