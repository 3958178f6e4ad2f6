//! Triggers — momentary motion and doorbell signals.
//!
//! Most upstreams only report the rising edge of these events. The
//! debouncer in the app layer turns each pulse into a level that stays
//! active for a reset window.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::event::Timestamp;
use crate::id::NativeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Motion,
    Doorbell,
}

impl TriggerKind {
    /// Capability a device needs to report this kind of trigger.
    #[must_use]
    pub fn capability(self) -> Capability {
        match self {
            Self::Motion => Capability::MotionSensor,
            Self::Doorbell => Capability::BinarySensor,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Motion => "motion",
            Self::Doorbell => "doorbell",
        })
    }
}

/// Level state of one trigger as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    pub native_id: NativeId,
    pub kind: TriggerKind,
    pub active: bool,
    /// When the level drops unless another pulse arrives.
    pub reset_deadline: Timestamp,
}

impl TriggerState {
    /// A raised level that resets after `remaining`.
    #[must_use]
    pub fn raised(native_id: NativeId, kind: TriggerKind, remaining: Duration) -> Self {
        let remaining = chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            native_id,
            kind,
            active: true,
            reset_deadline: Utc::now() + remaining,
        }
    }

    /// Time left before the reset deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.reset_deadline - Utc::now())
            .to_std()
            .unwrap_or_default()
    }
}
