//! Provider tuning knobs.

use std::time::Duration;

use serde::Deserialize;

/// Limits and timeouts of the camera provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Concurrent outbound video sessions allowed per device.
    pub max_concurrent_streams: usize,
    /// How long a motion or doorbell level stays active after a pulse, in seconds.
    pub trigger_reset_secs: u64,
    /// How long a second-factor challenge stays valid, in seconds.
    pub challenge_ttl_secs: u64,
    /// Deadline for login, refresh and discovery calls, in seconds.
    pub upstream_timeout_secs: u64,
    /// Deadline for stream and intercom negotiation, in seconds.
    pub negotiate_timeout_secs: u64,
    /// How long an active session may go without activity before it is
    /// closed, in seconds.
    pub stream_idle_secs: u64,
    /// Capacity of the in-process event bus.
    pub event_bus_capacity: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 2,
            trigger_reset_secs: 10,
            challenge_ttl_secs: 300,
            upstream_timeout_secs: 15,
            negotiate_timeout_secs: 10,
            stream_idle_secs: 300,
            event_bus_capacity: 256,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn trigger_reset_window(&self) -> Duration {
        Duration::from_secs(self.trigger_reset_secs)
    }

    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    #[must_use]
    pub fn negotiate_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiate_timeout_secs)
    }

    #[must_use]
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_secs)
    }

    /// Period of the idle session sweep; never shorter than a second.
    #[must_use]
    pub fn stream_sweep_interval(&self) -> Duration {
        (self.stream_idle_timeout() / 2).max(Duration::from_secs(1))
    }
}
