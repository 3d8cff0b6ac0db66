//! Transactional record store boundary.
//!
//! A store owns two logical tables: the inventory records (keyed by product id)
//! and the append-only movement log (keyed by inventory id + sequence). Every
//! mutation goes through [`StockStore::transact`], which updates both under one
//! per-record lock.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use query::{MovementCursor, MovementPage, MovementQuery, Pagination};
pub use r#trait::{Committed, Decide, StockStore, StoreError, stage_movements};
