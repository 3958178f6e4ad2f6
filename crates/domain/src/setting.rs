//! Settings — the configuration surface shown by the host.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const EMAIL: &str = "email";
pub const PASSWORD: &str = "password";
pub const TWO_FACTOR_CODE: &str = "twoFactorCode";
/// Key of the only setting asked for when creating a device by hand.
pub const DEVICE_NAME: &str = "name";

/// How the host renders a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    String,
    Password,
}

/// One entry of the settings form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub value: Option<String>,
}

impl Setting {
    fn new(key: &str, title: &str, kind: SettingKind) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            description: None,
            kind,
            value: None,
        }
    }
}

/// Settings the provider understands, parsed from a raw key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSetting {
    Email,
    Password,
    /// Write-once: consumed by the login flow, never stored.
    TwoFactorCode,
}

impl AccountSetting {
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownSetting`] for any other key.
    pub fn parse(key: &str) -> Result<Self, ValidationError> {
        match key {
            EMAIL => Ok(Self::Email),
            PASSWORD => Ok(Self::Password),
            TWO_FACTOR_CODE => Ok(Self::TwoFactorCode),
            other => Err(ValidationError::UnknownSetting(other.to_string())),
        }
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Email => EMAIL,
            Self::Password => PASSWORD,
            Self::TwoFactorCode => TWO_FACTOR_CODE,
        }
    }

    /// Whether a change invalidates the current session.
    #[must_use]
    pub fn invalidates_session(self) -> bool {
        matches!(self, Self::Email | Self::Password)
    }

    /// Form entry for this setting, carrying `value` when given.
    #[must_use]
    pub fn describe(self, value: Option<String>) -> Setting {
        let mut setting = match self {
            Self::Email => Setting::new(EMAIL, "Email", SettingKind::String),
            Self::Password => Setting::new(PASSWORD, "Password", SettingKind::Password),
            Self::TwoFactorCode => {
                let mut s = Setting::new(TWO_FACTOR_CODE, "Two Factor Code", SettingKind::String);
                s.description = Some(
                    "Optional: If 2 factor is enabled on your account, enter the code sent to your email or phone number."
                        .to_string(),
                );
                s
            }
        };
        setting.value = value;
        setting
    }
}

/// Form shown when the user adds a device by hand.
#[must_use]
pub fn create_device_settings() -> Vec<Setting> {
    vec![Setting::new(DEVICE_NAME, "Name", SettingKind::String)]
}
