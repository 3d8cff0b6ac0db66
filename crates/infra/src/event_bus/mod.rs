//! Infrastructure event bus implementations.
//!
//! The bus abstraction lives in `stockledger-events`; this module provides
//! broker-backed transports for published ledger events.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};
