//! Sample integration configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for the sample camera integration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Directory holding the media files.
    pub media_dir: PathBuf,
    /// Still image returned by snapshots.
    pub image_file: String,
    /// Clip looped by video streams.
    pub video_file: String,
    /// Names of the plain cameras on the simulated account.
    pub cameras: Vec<String>,
    /// Names of the doorbell cameras on the simulated account.
    pub doorbells: Vec<String>,
    pub model: String,
    pub manufacturer: String,
    /// When set, logins require this second-factor code.
    pub two_factor_code: Option<String>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("fs"),
            image_file: "dog.jpg".to_string(),
            video_file: "dog.mp4".to_string(),
            cameras: vec!["camera 1".to_string(), "camera 2".to_string()],
            doorbells: Vec::new(),
            model: "Doggy Cam".to_string(),
            manufacturer: "Sample Camera Manufacturer".to_string(),
            two_factor_code: None,
        }
    }
}

impl SampleConfig {
    #[must_use]
    pub fn image_path(&self) -> PathBuf {
        self.media_dir.join(&self.image_file)
    }

    #[must_use]
    pub fn video_path(&self) -> PathBuf {
        self.media_dir.join(&self.video_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = SampleConfig::default();
        assert_eq!(config.cameras, vec!["camera 1", "camera 2"]);
        assert!(config.doorbells.is_empty());
        assert_eq!(config.model, "Doggy Cam");
        assert_eq!(config.image_path(), PathBuf::from("fs/dog.jpg"));
        assert_eq!(config.video_path(), PathBuf::from("fs/dog.mp4"));
        assert!(config.two_factor_code.is_none());
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            media_dir = "/srv/media"
            cameras = ["porch"]
            doorbells = ["front door"]
            two_factor_code = "123456"
        "#;
        let config: SampleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.media_dir, PathBuf::from("/srv/media"));
        assert_eq!(config.cameras, vec!["porch"]);
        assert_eq!(config.doorbells, vec!["front door"]);
        assert_eq!(config.two_factor_code.as_deref(), Some("123456"));
        assert_eq!(config.video_file, "dog.mp4");
    }
}
