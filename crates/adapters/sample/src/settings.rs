//! In-memory settings store.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use minicam_app::ports::SettingsStore;
use minicam_domain::error::MiniCamError;

/// Settings kept in memory; lost when the process exits.
#[derive(Default)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    /// Create a store pre-filled with `values`.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, MiniCamError>> + Send {
        async move { Ok(self.values.read().await.get(key).cloned()) }
    }

    fn put(
        &self,
        key: &str,
        value: Option<String>,
    ) -> impl Future<Output = Result<(), MiniCamError>> + Send {
        async move {
            let mut values = self.values.write().await;
            match value {
                Some(value) => {
                    values.insert(key.to_string(), value);
                }
                None => {
                    values.remove(key);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_return_none_for_unset_key() {
        let store = InMemorySettingsStore::default();
        assert_eq!(store.get("email").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_overwrite_and_remove_values() {
        let store = InMemorySettingsStore::with_values([("email", "a@example.com")]);

        store.put("email", Some("b@example.com".to_string())).await.unwrap();
        assert_eq!(store.get("email").await.unwrap().as_deref(), Some("b@example.com"));

        store.put("email", None).await.unwrap();
        assert_eq!(store.get("email").await.unwrap(), None);
    }
}
