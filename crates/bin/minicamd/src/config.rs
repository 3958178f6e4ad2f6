//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `minicam.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;

use serde::Deserialize;

use minicam_adapter_sample::SampleConfig;
use minicam_app::ProviderConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Provider limits and timeouts.
    pub provider: ProviderConfig,
    /// Sample camera integration.
    pub sample: SampleConfig,
    /// Account credentials seeded into the settings store at startup.
    pub account: AccountConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Upstream account credentials.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from `minicam.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// limit is zero.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("minicam.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MINICAM_EMAIL") {
            self.account.email = Some(val);
        }
        if let Ok(val) = std::env::var("MINICAM_PASSWORD") {
            self.account.password = Some(val);
        }
        if let Ok(val) = std::env::var("MINICAM_MEDIA_DIR") {
            self.sample.media_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MINICAM_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.max_concurrent_streams == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_streams must be non-zero".to_string(),
            ));
        }
        if self.provider.trigger_reset_secs == 0 {
            return Err(ConfigError::Validation(
                "trigger_reset_secs must be non-zero".to_string(),
            ));
        }
        if self.provider.challenge_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "challenge_ttl_secs must be non-zero".to_string(),
            ));
        }
        if self.provider.stream_idle_secs == 0 {
            return Err(ConfigError::Validation(
                "stream_idle_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Credentials to seed, as settings key/value pairs.
    #[must_use]
    pub fn account_settings(&self) -> Vec<(&'static str, String)> {
        let email = self
            .account
            .email
            .clone()
            .map(|email| (minicam_domain::setting::EMAIL, email));
        let password = self
            .account
            .password
            .clone()
            .map(|password| (minicam_domain::setting::PASSWORD, password));
        email.into_iter().chain(password).collect()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "minicamd=info,minicam_app=info,minicam_adapter_sample=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
