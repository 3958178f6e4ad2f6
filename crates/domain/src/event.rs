//! Event — a notification sent from the provider to the host platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;
use crate::id::{EventId, NativeId};
use crate::trigger::TriggerKind;

/// UTC timestamp attached to every event.
pub type Timestamp = DateTime<Utc>;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Batched result of a discovery or manual device change.
    DevicesChanged {
        added: Vec<NativeId>,
        updated: Vec<NativeId>,
        removed: Vec<NativeId>,
    },
    /// The interfaces a device exposes changed.
    InterfacesChanged {
        native_id: NativeId,
        capabilities: CapabilitySet,
    },
    /// A motion or doorbell level changed.
    SensorChanged {
        native_id: NativeId,
        kind: TriggerKind,
        active: bool,
    },
}

/// Immutable record of something the host should learn about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    #[must_use]
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
