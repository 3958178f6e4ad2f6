//! Device — a camera or doorbell known to the provider.

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};
use crate::error::{MiniCamError, ValidationError};
use crate::id::NativeId;

/// Kind of device as presented to the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Camera,
    Doorbell,
}

/// Descriptive metadata shown by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub manufacturer: Option<String>,
}

/// A device tracked by the registry, keyed by its [`NativeId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub native_id: NativeId,
    pub name: String,
    pub info: DeviceInfo,
    pub capabilities: CapabilitySet,
}

impl DeviceRecord {
    /// Create a builder for constructing a [`DeviceRecord`].
    #[must_use]
    pub fn builder() -> DeviceRecordBuilder {
        DeviceRecordBuilder::default()
    }

    /// Default record for an id the registry has never seen: named after
    /// the id, with picture and video support only.
    #[must_use]
    pub fn placeholder(native_id: NativeId) -> Self {
        Self {
            name: native_id.to_string(),
            native_id,
            info: DeviceInfo::default(),
            capabilities: CapabilitySet::basic_camera(),
        }
    }

    /// Doorbells are cameras with a button.
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        if self.capabilities.contains(Capability::BinarySensor) {
            DeviceType::Doorbell
        } else {
            DeviceType::Camera
        }
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Fail with [`MiniCamError::UnsupportedCapability`] unless the device
    /// exposes `capability`.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn require(&self, capability: Capability) -> Result<(), MiniCamError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(MiniCamError::UnsupportedCapability {
                native_id: self.native_id.clone(),
                capability,
            })
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] when `name` is empty.
    pub fn validate(&self) -> Result<(), MiniCamError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`DeviceRecord`].
#[derive(Debug, Default)]
pub struct DeviceRecordBuilder {
    native_id: Option<NativeId>,
    name: Option<String>,
    info: DeviceInfo,
    capabilities: Option<CapabilitySet>,
}

impl DeviceRecordBuilder {
    #[must_use]
    pub fn native_id(mut self, native_id: NativeId) -> Self {
        self.native_id = Some(native_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.info.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.info.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Consume the builder, validate, and return a [`DeviceRecord`].
    ///
    /// When no name is given the native id doubles as the name.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] if the native id is missing
    /// or the name is empty.
    pub fn build(self) -> Result<DeviceRecord, MiniCamError> {
        let native_id = self.native_id.ok_or(ValidationError::EmptyNativeId)?;
        let record = DeviceRecord {
            name: self.name.unwrap_or_else(|| native_id.to_string()),
            native_id,
            info: self.info,
            capabilities: self.capabilities.unwrap_or_else(CapabilitySet::basic_camera),
        };
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> NativeId {
        NativeId::parse(raw).unwrap()
    }

    #[test]
    fn should_build_valid_record_when_id_provided() {
        let record = DeviceRecord::builder()
            .native_id(id("camera 1"))
            .model("Doggy Cam")
            .manufacturer("Sample Camera Manufacturer")
            .capabilities(CapabilitySet::camera())
            .build()
            .unwrap();
        assert_eq!(record.name, "camera 1");
        assert_eq!(record.info.model.as_deref(), Some("Doggy Cam"));
        assert_eq!(record.device_type(), DeviceType::Camera);
    }

    #[test]
    fn should_return_validation_error_when_native_id_missing() {
        let result = DeviceRecord::builder().name("Front").build();
        assert!(matches!(
            result,
            Err(MiniCamError::InvalidArgument(ValidationError::EmptyNativeId))
        ));
    }

    #[test]
    fn should_return_validation_error_when_name_is_blank() {
        let result = DeviceRecord::builder()
            .native_id(id("camA"))
            .name("  ")
            .build();
        assert!(matches!(
            result,
            Err(MiniCamError::InvalidArgument(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_report_doorbell_type_when_binary_sensor_present() {
        let record = DeviceRecord::builder()
            .native_id(id("door"))
            .capabilities(CapabilitySet::doorbell())
            .build()
            .unwrap();
        assert_eq!(record.device_type(), DeviceType::Doorbell);
    }

    #[test]
    fn should_fail_require_when_capability_missing() {
        let record = DeviceRecord::placeholder(id("camA"));
        assert!(record.require(Capability::VideoStream).is_ok());
        assert!(matches!(
            record.require(Capability::Intercom),
            Err(MiniCamError::UnsupportedCapability {
                capability: Capability::Intercom,
                ..
            })
        ));
    }

    #[test]
    fn should_name_placeholder_after_its_id() {
        let record = DeviceRecord::placeholder(id("camB"));
        assert_eq!(record.name, "camB");
        assert_eq!(record.capabilities, CapabilitySet::basic_camera());
    }
}
