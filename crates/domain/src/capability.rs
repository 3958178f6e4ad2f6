//! Capabilities — the interfaces a device exposes to the host platform.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single interface a device can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Still pictures.
    Camera,
    /// Outbound video streams.
    VideoStream,
    /// Motion detection pulses.
    MotionSensor,
    /// On/off sensor, used for doorbell presses.
    BinarySensor,
    /// Inbound two-way audio.
    Intercom,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Camera => "camera",
            Self::VideoStream => "video_stream",
            Self::MotionSensor => "motion_sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Intercom => "intercom",
        })
    }
}

/// Ordered set of [`Capability`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capabilities of a manually created camera: pictures and video.
    #[must_use]
    pub fn basic_camera() -> Self {
        [Capability::Camera, Capability::VideoStream]
            .into_iter()
            .collect()
    }

    /// Capabilities of a discovered camera: pictures, video and motion.
    #[must_use]
    pub fn camera() -> Self {
        [
            Capability::Camera,
            Capability::VideoStream,
            Capability::MotionSensor,
        ]
        .into_iter()
        .collect()
    }

    /// Capabilities of a discovered doorbell: a camera with a button and a speaker.
    #[must_use]
    pub fn doorbell() -> Self {
        let mut set = Self::camera();
        set.insert(Capability::BinarySensor);
        set.insert(Capability::Intercom);
        set
    }

    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Add a capability, returning `true` when it was not present yet.
    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    /// Remove a capability, returning `true` when it was present.
    pub fn remove(&mut self, capability: Capability) -> bool {
        self.0.remove(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for capability in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            capability.fmt(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_include_motion_in_discovered_camera() {
        let set = CapabilitySet::camera();
        assert!(set.contains(Capability::Camera));
        assert!(set.contains(Capability::VideoStream));
        assert!(set.contains(Capability::MotionSensor));
        assert!(!set.contains(Capability::Intercom));
    }

    #[test]
    fn should_add_button_and_speaker_for_doorbell() {
        let set = CapabilitySet::doorbell();
        assert!(set.contains(Capability::BinarySensor));
        assert!(set.contains(Capability::Intercom));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn should_compare_equal_regardless_of_insertion_order() {
        let a: CapabilitySet = [Capability::Intercom, Capability::Camera].into_iter().collect();
        let b: CapabilitySet = [Capability::Camera, Capability::Intercom].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn should_report_whether_insert_changed_the_set() {
        let mut set = CapabilitySet::basic_camera();
        assert!(!set.insert(Capability::Camera));
        assert!(set.insert(Capability::MotionSensor));
        assert!(set.remove(Capability::MotionSensor));
        assert!(!set.remove(Capability::MotionSensor));
    }

    #[test]
    fn should_display_comma_separated_names() {
        assert_eq!(
            CapabilitySet::basic_camera().to_string(),
            "camera,video_stream"
        );
        assert_eq!(CapabilitySet::empty().to_string(), "");
    }

    #[test]
    fn should_serialize_as_snake_case_array() {
        let json = serde_json::to_string(&CapabilitySet::basic_camera()).unwrap();
        assert_eq!(json, r#"["camera","video_stream"]"#);
    }
}
