//! # minicamd — minicam daemon
//!
//! Composition root that wires the sample camera adapter into the provider.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise structured logging
//! - Construct the adapters and inject them into the provider via port traits
//! - Seed the account credentials and run the initial discovery
//! - Log every event published to the host
//! - Shut down cleanly on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

use minicam_adapter_sample::{InMemorySettingsStore, SampleAccount, SampleTransport};
use minicam_app::CameraProvider;
use minicam_app::event_bus::InProcessEventBus;
use minicam_domain::event::Event;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(config.provider.event_bus_capacity));
    let event_log = tokio::spawn(log_events(BroadcastStream::new(event_bus.subscribe())));

    // Adapters
    let settings = InMemorySettingsStore::with_values(config.account_settings());
    let account = Arc::new(SampleAccount::new(config.sample.clone()));
    let transport = Arc::new(SampleTransport::new(config.sample.clone()));

    let provider = CameraProvider::new(
        config.provider.clone(),
        account,
        transport,
        settings,
        event_bus,
    );
    tracing::info!(media_dir = %config.sample.media_dir.display(), "minicamd starting");

    match provider.discover_devices(Duration::ZERO).await {
        Ok(diff) => tracing::info!(devices = diff.added.len(), "initial discovery complete"),
        Err(err) => tracing::warn!(error = %err, alert = %err.user_message(), "initial discovery failed"),
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupted, shutting down");

    provider.shutdown().await;
    event_log.abort();
    Ok(())
}

/// Log every event as JSON until the bus closes.
async fn log_events(mut events: BroadcastStream<Event>) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(event = %json, "event published"),
                Err(err) => tracing::warn!(%err, "failed to serialize event"),
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagged, some events were dropped");
            }
        }
    }
}
