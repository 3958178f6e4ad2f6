//! # minicam-adapter-sample
//!
//! Sample camera integration: a simulated manufacturer account and a media
//! transport that serves files from a local media directory.
//!
//! ## Provided pieces
//!
//! | Type | Port | Behaviour |
//! |------|------|-----------|
//! | [`SampleAccount`] | `UpstreamAccount` | Accepts any non-empty email/password, optional second factor, lists the configured cameras |
//! | [`SampleTransport`] | `MediaTransport` | Loops `dog.mp4` through `ffmpeg` input arguments, snapshots `dog.jpg` |
//! | [`InMemorySettingsStore`] | `SettingsStore` | Keeps settings in memory for the process lifetime |
//!
//! ## Dependency rule
//!
//! Depends on `minicam-app` (port traits) and `minicam-domain` only.

pub mod config;
pub mod error;
pub mod settings;
pub mod transport;
pub mod upstream;

pub use config::SampleConfig;
pub use error::SampleError;
pub use settings::InMemorySettingsStore;
pub use transport::SampleTransport;
pub use upstream::SampleAccount;
