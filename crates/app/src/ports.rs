//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod event_bus;
pub mod settings;
pub mod transport;
pub mod upstream;

pub use event_bus::EventPublisher;
pub use settings::SettingsStore;
pub use transport::{MediaTransport, Negotiated};
pub use upstream::{Grant, LoginResponse, UpstreamAccount, UpstreamCamera, UpstreamEvent};
