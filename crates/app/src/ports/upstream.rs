//! Upstream account port — the manufacturer cloud (or local API) being wrapped.
//!
//! An upstream authenticates an account, lists the cameras visible to it and
//! reports motion / doorbell pulses. Failures should come back as
//! [`MiniCamError::UpstreamUnavailable`] when the service could not be
//! reached and [`MiniCamError::AuthRejected`] when it refused the session.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;

use minicam_domain::capability::CapabilitySet;
use minicam_domain::credential::{AccessToken, Secret};
use minicam_domain::device::DeviceRecord;
use minicam_domain::error::MiniCamError;
use minicam_domain::id::NativeId;
use minicam_domain::trigger::TriggerKind;

/// Tokens handed out after a successful authentication.
#[derive(Debug, Clone)]
pub struct Grant {
    pub access_token: AccessToken,
    pub refresh_token: Option<Secret>,
    /// Lifetime of `access_token`; `None` means it does not expire.
    pub expires_in: Option<Duration>,
}

/// Upstream answer to a login, challenge or refresh request.
#[derive(Debug, Clone)]
pub enum LoginResponse {
    Authenticated(Grant),
    /// A second factor is needed; `challenge` identifies the pending attempt.
    ChallengeRequired { challenge: Secret },
    Rejected { reason: String },
}

/// A camera as listed by the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamCamera {
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub is_doorbell: bool,
}

impl UpstreamCamera {
    /// Map to the record the registry keeps.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] when the upstream id or name
    /// is empty.
    pub fn into_record(self) -> Result<DeviceRecord, MiniCamError> {
        let capabilities = if self.is_doorbell {
            CapabilitySet::doorbell()
        } else {
            CapabilitySet::camera()
        };
        let mut builder = DeviceRecord::builder()
            .native_id(NativeId::parse(self.id)?)
            .name(self.name)
            .capabilities(capabilities);
        if let Some(model) = self.model {
            builder = builder.model(model);
        }
        if let Some(manufacturer) = self.manufacturer {
            builder = builder.manufacturer(manufacturer);
        }
        builder.build()
    }
}

/// A rising edge reported by the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub native_id: NativeId,
    pub kind: TriggerKind,
}

/// The external account/API that owns the cameras.
pub trait UpstreamAccount: Send + Sync + 'static {
    /// Authenticate with an account identifier and secret.
    fn login(
        &self,
        account: &str,
        secret: &Secret,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send;

    /// Complete a pending second-factor challenge.
    fn verify_challenge(
        &self,
        account: &str,
        challenge: &Secret,
        code: &str,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send;

    /// Exchange a refresh token for a new access token.
    fn refresh(
        &self,
        refresh_token: &Secret,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send;

    /// List the cameras visible to the authenticated account.
    fn list_cameras(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Vec<UpstreamCamera>, MiniCamError>> + Send;

    /// Subscribe to motion and doorbell pulses.
    fn subscribe_events(&self) -> broadcast::Receiver<UpstreamEvent>;
}
