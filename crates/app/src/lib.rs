//! # minicam-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `UpstreamAccount` — login, second factor, token refresh, camera listing, event feed
//!   - `MediaTransport` — stream negotiation, intercom playback, snapshots, resource release
//!   - `SettingsStore` — persisted settings and secrets
//!   - `EventPublisher` — notifications to the host platform
//! - Provide the four stateful components:
//!   - `DeviceRegistry` — discovery reconciliation, the single source of truth for devices
//!   - `CredentialManager` — login / challenge / refresh state machine
//!   - `StreamController` — per-device video and intercom sessions
//!   - `TriggerDebouncer` — edge-to-level conversion for motion and doorbell pulses
//! - Provide the **driving/inbound port**: `CameraProvider`, the facade the host calls
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `minicam-domain` only (plus `tokio` for sync, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod config;
pub mod event_bus;
pub mod ports;
pub mod provider;
pub mod services;

pub use config::ProviderConfig;
pub use provider::CameraProvider;
