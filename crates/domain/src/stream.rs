//! Stream sessions — live media transports bound to one device.
//!
//! ```text
//! Idle -> Negotiating -> Active -> Closing -> Idle
//!              |            |
//!              |            +------> Failed -> Idle
//!              +-> Failed -> Idle
//!              +-> Closing -> Idle   (cancelled while negotiating)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{NativeId, SessionId};
use crate::media::MediaDescriptor;

/// Which way the media flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Camera video sent to the host.
    OutboundVideo,
    /// Host audio played on the device speaker.
    InboundAudio,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OutboundVideo => "outbound_video",
            Self::InboundAudio => "inbound_audio",
        })
    }
}

/// Lifecycle state of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Negotiating,
    Active,
    Closing,
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Negotiating)
                | (Self::Negotiating, Self::Active | Self::Failed | Self::Closing)
                | (Self::Active, Self::Closing | Self::Failed)
                | (Self::Closing | Self::Failed, Self::Idle)
        )
    }

    /// Whether the session holds, or is about to hold, a transport resource.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Negotiating | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Failed => "failed",
        })
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Opaque reference to a resource held by the media transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportHandle(String);

impl TransportHandle {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bookkeeping for one media session.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: SessionId,
    pub native_id: NativeId,
    pub direction: Direction,
    state: SessionState,
    cancel_requested: bool,
}

impl StreamSession {
    /// A fresh session, in [`SessionState::Idle`].
    #[must_use]
    pub fn new(native_id: NativeId, direction: Direction) -> Self {
        Self {
            id: SessionId::new(),
            native_id,
            direction,
            state: SessionState::Idle,
            cancel_requested: false,
        }
    }

    /// A session that already reserved its slot and is negotiating.
    #[must_use]
    pub fn begin(native_id: NativeId, direction: Direction) -> Self {
        Self {
            state: SessionState::Negotiating,
            ..Self::new(native_id, direction)
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the state machine forbids it.
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Ask an in-flight negotiation to release its resource on completion.
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }
}

/// What the caller receives after opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub native_id: NativeId,
    pub direction: Direction,
    /// How the media pipeline fetches the feed.
    pub descriptor: MediaDescriptor,
}
