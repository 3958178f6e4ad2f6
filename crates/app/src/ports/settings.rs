//! Settings store port — persisted plugin settings.
//!
//! Secrets (the account password) go through the same port; keeping them
//! encrypted or out of plain files is the adapter's responsibility.

use std::future::Future;

use minicam_domain::error::MiniCamError;

/// Key/value storage for settings.
pub trait SettingsStore: Send + Sync + 'static {
    /// Read a value, `None` when never set.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, MiniCamError>> + Send;

    /// Write a value; `None` removes it.
    fn put(
        &self,
        key: &str,
        value: Option<String>,
    ) -> impl Future<Output = Result<(), MiniCamError>> + Send;
}
