//! Application services — the stateful components behind the provider.
//!
//! Each service owns its state exclusively and accepts port trait
//! implementations via generic parameters (constructor injection), keeping
//! this layer decoupled from concrete adapters.

pub mod credential_manager;
pub mod device_registry;
pub mod stream_controller;
pub mod trigger_debouncer;
