//! Credentials — account secret material and login outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Secret string whose `Debug`/`Display` never reveal the content.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the cleartext, for handing to the upstream only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite the bytes in place and empty the string.
    pub fn clear(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        wipe(&mut bytes);
    }
}

/// Zero `bytes`; `black_box` keeps the stores from being elided before the
/// buffer is freed.
fn wipe(bytes: &mut [u8]) {
    bytes.fill(0);
    std::hint::black_box(&*bytes);
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Bearer token issued by the upstream after a successful login.
pub type AccessToken = Secret;

/// Session material held by the credential manager while logged in or
/// waiting for a second factor.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub account_identifier: String,
    pub secret: Secret,
    /// Pending second-factor challenge token, if the upstream demanded one.
    pub multi_factor_challenge: Option<Secret>,
    pub refresh_token: Option<Secret>,
}

impl SessionCredential {
    #[must_use]
    pub fn new(account_identifier: impl Into<String>, secret: Secret) -> Self {
        Self {
            account_identifier: account_identifier.into(),
            secret,
            multi_factor_challenge: None,
            refresh_token: None,
        }
    }

    /// Drop every piece of secret material held in memory.
    pub fn wipe(&mut self) {
        self.secret.clear();
        if let Some(challenge) = self.multi_factor_challenge.as_mut() {
            challenge.clear();
        }
        self.multi_factor_challenge = None;
        if let Some(token) = self.refresh_token.as_mut() {
            token.clear();
        }
        self.refresh_token = None;
    }
}

/// Result of a login or challenge submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    Success,
    ChallengeRequired,
    Failure { reason: String },
}

/// Observable login state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    LoggedOut,
    AwaitingChallenge,
    LoggedIn,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoggedOut => "logged_out",
            Self::AwaitingChallenge => "awaiting_challenge",
            Self::LoggedIn => "logged_in",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_redact_secret_in_debug_output() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn should_empty_secret_when_cleared() {
        let mut secret = Secret::new("hunter2");
        secret.clear();
        assert!(secret.is_empty());
    }

    #[test]
    fn should_zero_every_byte_when_wiped() {
        let mut bytes = b"hunter2".to_vec();
        wipe(&mut bytes);
        assert!(bytes.iter().all(|b| *b == 0));
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn should_wipe_all_material_from_credential() {
        let mut credential = SessionCredential::new("me@example.com", Secret::new("pw"));
        credential.multi_factor_challenge = Some(Secret::new("challenge"));
        credential.refresh_token = Some(Secret::new("refresh"));

        credential.wipe();

        assert!(credential.secret.is_empty());
        assert!(credential.multi_factor_challenge.is_none());
        assert!(credential.refresh_token.is_none());
        assert_eq!(credential.account_identifier, "me@example.com");
    }

    #[test]
    fn should_not_leak_secret_through_credential_debug() {
        let credential = SessionCredential::new("me@example.com", Secret::new("hunter2"));
        assert!(!format!("{credential:?}").contains("hunter2"));
    }

    #[test]
    fn should_serialize_failure_outcome_with_reason() {
        let outcome = LoginOutcome::Failure {
            reason: "bad password".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"outcome": "failure", "reason": "bad password"})
        );
    }
}
