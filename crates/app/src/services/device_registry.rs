//! Device registry — the single source of truth for which devices exist.
//!
//! Records are keyed by [`NativeId`] and only ever handed out as clones, so
//! a reader sees either the record before or after a write, never a mix.

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::RwLock;

use minicam_domain::capability::CapabilitySet;
use minicam_domain::device::DeviceRecord;
use minicam_domain::error::{MiniCamError, NotFoundError};
use minicam_domain::event::{Event, EventPayload};
use minicam_domain::id::NativeId;

use crate::ports::EventPublisher;

/// What a discovery pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub added: Vec<NativeId>,
    pub updated: Vec<NativeId>,
    pub removed: Vec<NativeId>,
}

impl DiffResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug)]
struct Entry {
    record: DeviceRecord,
    /// Created by the user rather than reported by the upstream; exempt
    /// from removal during discovery.
    manual: bool,
}

/// Owning collection of [`DeviceRecord`]s.
pub struct DeviceRegistry<P> {
    devices: RwLock<BTreeMap<NativeId, Entry>>,
    publisher: P,
}

impl<P: EventPublisher> DeviceRegistry<P> {
    /// Create an empty registry that reports changes through `publisher`.
    pub fn new(publisher: P) -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            publisher,
        }
    }

    /// Reconcile the registry with the upstream's current enumeration.
    ///
    /// Devices missing from the registry are added, devices whose record
    /// differs are updated, and discovered devices missing from `source` are
    /// removed. Calling twice with the same list yields an empty diff.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] if any record is invalid, in
    /// which case nothing is applied.
    #[tracing::instrument(skip_all, fields(source = source.len()))]
    pub async fn discover(&self, source: Vec<DeviceRecord>) -> Result<DiffResult, MiniCamError> {
        let mut incoming = BTreeMap::new();
        for record in source {
            record.validate()?;
            incoming.insert(record.native_id.clone(), record);
        }

        let mut diff = DiffResult::default();
        let mut interface_changes = Vec::new();
        {
            let mut devices = self.devices.write().await;

            let stale: Vec<NativeId> = devices
                .iter()
                .filter(|(id, entry)| !entry.manual && !incoming.contains_key(*id))
                .map(|(id, _)| id.clone())
                .collect();
            for id in stale {
                devices.remove(&id);
                diff.removed.push(id);
            }

            for (id, record) in incoming {
                match devices.get_mut(&id) {
                    None => {
                        devices.insert(
                            id.clone(),
                            Entry {
                                record,
                                manual: false,
                            },
                        );
                        diff.added.push(id);
                    }
                    Some(entry) if entry.record != record => {
                        if entry.record.capabilities != record.capabilities {
                            interface_changes.push((id.clone(), record.capabilities.clone()));
                        }
                        entry.record = record;
                        entry.manual = false;
                        diff.updated.push(id);
                    }
                    Some(_) => {}
                }
            }
        }

        if diff.is_empty() {
            tracing::debug!("discovery found no changes");
            return Ok(diff);
        }

        tracing::info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "device set changed"
        );
        self.notify(EventPayload::DevicesChanged {
            added: diff.added.clone(),
            updated: diff.updated.clone(),
            removed: diff.removed.clone(),
        })
        .await;
        for (native_id, capabilities) in interface_changes {
            self.notify(EventPayload::InterfacesChanged {
                native_id,
                capabilities,
            })
            .await;
        }
        Ok(diff)
    }

    /// Run [`discover`](Self::discover) on the outcome of an upstream call.
    ///
    /// When `source` fails the registry keeps its last-known-good devices.
    ///
    /// # Errors
    ///
    /// Returns the upstream error unchanged, or a validation error from
    /// [`discover`](Self::discover).
    pub async fn discover_from<F>(&self, source: F) -> Result<DiffResult, MiniCamError>
    where
        F: Future<Output = Result<Vec<DeviceRecord>, MiniCamError>>,
    {
        match source.await {
            Ok(records) => self.discover(records).await,
            Err(err) => {
                let kept = self.devices.read().await.len();
                tracing::warn!(error = %err, kept, "discovery source failed, keeping known devices");
                Err(err)
            }
        }
    }

    /// Return the record for `native_id`, creating a placeholder if the
    /// registry has never seen it.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] when `native_id` is empty.
    pub async fn get_or_create(&self, native_id: &str) -> Result<DeviceRecord, MiniCamError> {
        let native_id = NativeId::parse(native_id)?;
        if let Some(entry) = self.devices.read().await.get(&native_id) {
            return Ok(entry.record.clone());
        }

        let mut devices = self.devices.write().await;
        let entry = devices.entry(native_id).or_insert_with_key(|id| {
            tracing::debug!(native_id = %id, "creating placeholder device");
            Entry {
                record: DeviceRecord::placeholder(id.clone()),
                manual: false,
            }
        });
        Ok(entry.record.clone())
    }

    /// Look up a device.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::NotFound`] when the device is unknown.
    pub async fn get(&self, native_id: &NativeId) -> Result<DeviceRecord, MiniCamError> {
        self.devices
            .read()
            .await
            .get(native_id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| not_found(native_id))
    }

    /// All devices, ordered by native id.
    pub async fn list(&self) -> Vec<DeviceRecord> {
        self.devices
            .read()
            .await
            .values()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Register a device the user created by hand.
    ///
    /// Manual devices survive discovery passes that do not mention them.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] if the record is invalid.
    #[tracing::instrument(skip(self, record), fields(native_id = %record.native_id))]
    pub async fn create(&self, record: DeviceRecord) -> Result<DeviceRecord, MiniCamError> {
        record.validate()?;
        let native_id = record.native_id.clone();
        let replaced = self
            .devices
            .write()
            .await
            .insert(
                native_id.clone(),
                Entry {
                    record: record.clone(),
                    manual: true,
                },
            )
            .is_some();

        let (added, updated) = if replaced {
            (vec![], vec![native_id])
        } else {
            (vec![native_id], vec![])
        };
        self.notify(EventPayload::DevicesChanged {
            added,
            updated,
            removed: vec![],
        })
        .await;
        Ok(record)
    }

    /// Replace the capability set of a device.
    ///
    /// Returns `false` without notifying anyone when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::NotFound`] when the device is unknown.
    #[tracing::instrument(skip(self, capabilities), fields(capabilities = %capabilities))]
    pub async fn apply_capability_change(
        &self,
        native_id: &NativeId,
        capabilities: CapabilitySet,
    ) -> Result<bool, MiniCamError> {
        {
            let mut devices = self.devices.write().await;
            let entry = devices
                .get_mut(native_id)
                .ok_or_else(|| not_found(native_id))?;
            if entry.record.capabilities == capabilities {
                return Ok(false);
            }
            entry.record.capabilities = capabilities.clone();
        }

        tracing::info!("device interfaces changed");
        self.notify(EventPayload::InterfacesChanged {
            native_id: native_id.clone(),
            capabilities,
        })
        .await;
        Ok(true)
    }

    /// Forget a device.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::NotFound`] when the device is unknown.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, native_id: &NativeId) -> Result<DeviceRecord, MiniCamError> {
        let entry = self
            .devices
            .write()
            .await
            .remove(native_id)
            .ok_or_else(|| not_found(native_id))?;

        self.notify(EventPayload::DevicesChanged {
            added: vec![],
            updated: vec![],
            removed: vec![native_id.clone()],
        })
        .await;
        Ok(entry.record)
    }

    async fn notify(&self, payload: EventPayload) {
        if let Err(err) = self.publisher.publish(Event::new(payload)).await {
            tracing::warn!(error = %err, "failed to notify platform");
        }
    }
}

fn not_found(native_id: &NativeId) -> MiniCamError {
    NotFoundError {
        entity: "Device",
        id: native_id.to_string(),
    }
    .into()
}
