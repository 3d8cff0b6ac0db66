//! Outbound event plumbing for the stock ledger.
//!
//! The ledger publishes facts after they are durably committed; how they travel
//! further (brokers, webhooks, alert throttling) is up to the bus implementation.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
