use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{EventId, InventoryId};

use crate::event::Event;

/// Envelope for a published event.
///
/// Carries the event id, the ISO-8601 timestamp (chrono serializes `DateTime<Utc>`
/// as RFC 3339) and the inventory stream position the event was emitted at.
/// `stream_version` is the record version after the change; for rejected
/// commands it is the unchanged version that was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: EventId,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    inventory_id: InventoryId,
    stream_version: u64,

    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, copying its type/version/timestamp metadata.
    pub fn wrap(event_id: EventId, inventory_id: InventoryId, stream_version: u64, payload: E) -> Self {
        Self {
            event_id,
            event_type: payload.event_type().to_string(),
            event_version: payload.version(),
            occurred_at: payload.occurred_at(),
            inventory_id,
            stream_version,
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn inventory_id(&self) -> InventoryId {
        self.inventory_id
    }

    pub fn stream_version(&self) -> u64 {
        self.stream_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Serialize> EventEnvelope<E> {
    /// Re-encode the payload as JSON for transports that do not know `E`.
    pub fn to_json(&self) -> Result<EventEnvelope<serde_json::Value>, serde_json::Error> {
        Ok(EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type.clone(),
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            inventory_id: self.inventory_id,
            stream_version: self.stream_version,
            payload: serde_json::to_value(&self.payload)?,
        })
    }
}
