//! Infrastructure layer: record stores, the stock ledger engine, configuration
//! and broker-backed event transports.

pub mod config;
pub mod event_bus;
pub mod ledger;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::{
    AdjustmentOutcome, LedgerError, MovementStream, ReleaseOutcome, ReservationOutcome,
    StockLedger, StockResponse,
};
pub use store::{
    InMemoryStockStore, MovementCursor, MovementPage, Pagination, PostgresStockStore, StockStore,
    StoreError,
};
