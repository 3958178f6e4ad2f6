//! Simulated manufacturer account.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use minicam_app::ports::{Grant, LoginResponse, UpstreamAccount, UpstreamCamera, UpstreamEvent};
use minicam_domain::credential::{AccessToken, Secret};
use minicam_domain::error::MiniCamError;
use minicam_domain::id::NativeId;
use minicam_domain::trigger::TriggerKind;

use crate::config::SampleConfig;

const ACCESS_PREFIX: &str = "sample-access-";
const REFRESH_PREFIX: &str = "sample-refresh-";
const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Account that accepts any non-empty email and password.
///
/// When [`SampleConfig::two_factor_code`] is set, every login asks for that
/// code before handing out tokens.
pub struct SampleAccount {
    config: SampleConfig,
    roster: RwLock<Vec<UpstreamCamera>>,
    events: broadcast::Sender<UpstreamEvent>,
    issued: AtomicU64,
}

impl SampleAccount {
    #[must_use]
    pub fn new(config: SampleConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        let roster = roster(&config, &config.cameras, &config.doorbells);
        Self {
            config,
            roster: RwLock::new(roster),
            events,
            issued: AtomicU64::new(0),
        }
    }

    /// Replace the cameras the account reports from now on.
    pub fn set_cameras(&self, cameras: &[&str], doorbells: &[&str]) {
        let cameras: Vec<String> = cameras.iter().map(ToString::to_string).collect();
        let doorbells: Vec<String> = doorbells.iter().map(ToString::to_string).collect();
        let roster = roster(&self.config, &cameras, &doorbells);
        tracing::info!(cameras = roster.len(), "sample roster changed");
        *self.roster.write().unwrap_or_else(PoisonError::into_inner) = roster;
    }

    /// Simulate a motion pulse, returning how many listeners saw it.
    pub fn trigger_motion(&self, native_id: NativeId) -> usize {
        self.emit(native_id, TriggerKind::Motion)
    }

    /// Simulate a doorbell press, returning how many listeners saw it.
    pub fn ring_doorbell(&self, native_id: NativeId) -> usize {
        self.emit(native_id, TriggerKind::Doorbell)
    }

    fn emit(&self, native_id: NativeId, kind: TriggerKind) -> usize {
        tracing::debug!(%native_id, %kind, "sample pulse");
        self.events
            .send(UpstreamEvent { native_id, kind })
            .unwrap_or_default()
    }

    fn grant(&self) -> LoginResponse {
        let n = self.issued.fetch_add(1, Ordering::Relaxed);
        LoginResponse::Authenticated(Grant {
            access_token: Secret::new(format!("{ACCESS_PREFIX}{n}")),
            refresh_token: Some(Secret::new(format!("{REFRESH_PREFIX}{n}"))),
            expires_in: Some(TOKEN_LIFETIME),
        })
    }
}

fn roster(config: &SampleConfig, cameras: &[String], doorbells: &[String]) -> Vec<UpstreamCamera> {
    let camera = |name: &String, is_doorbell: bool| UpstreamCamera {
        id: name.clone(),
        name: name.clone(),
        model: Some(config.model.clone()),
        manufacturer: Some(config.manufacturer.clone()),
        is_doorbell,
    };
    cameras
        .iter()
        .map(|name| camera(name, false))
        .chain(doorbells.iter().map(|name| camera(name, true)))
        .collect()
}

impl UpstreamAccount for SampleAccount {
    fn login(
        &self,
        account: &str,
        secret: &Secret,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send {
        let response = if account.trim().is_empty() || secret.is_empty() {
            LoginResponse::Rejected {
                reason: "email and password are required".to_string(),
            }
        } else if self.config.two_factor_code.is_some() {
            let n = self.issued.fetch_add(1, Ordering::Relaxed);
            LoginResponse::ChallengeRequired {
                challenge: Secret::new(format!("sample-challenge-{n}")),
            }
        } else {
            self.grant()
        };
        async { Ok(response) }
    }

    fn verify_challenge(
        &self,
        _account: &str,
        _challenge: &Secret,
        code: &str,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send {
        let response = if self.config.two_factor_code.as_deref() == Some(code) {
            self.grant()
        } else {
            LoginResponse::Rejected {
                reason: "invalid two factor code".to_string(),
            }
        };
        async { Ok(response) }
    }

    fn refresh(
        &self,
        refresh_token: &Secret,
    ) -> impl Future<Output = Result<LoginResponse, MiniCamError>> + Send {
        let response = if refresh_token.expose().starts_with(REFRESH_PREFIX) {
            self.grant()
        } else {
            LoginResponse::Rejected {
                reason: "unknown refresh token".to_string(),
            }
        };
        async { Ok(response) }
    }

    fn list_cameras(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Vec<UpstreamCamera>, MiniCamError>> + Send {
        let result = if token.expose().starts_with(ACCESS_PREFIX) {
            Ok(self
                .roster
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone())
        } else {
            Err(MiniCamError::AuthRejected)
        };
        async { result }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<UpstreamEvent> {
        self.events.subscribe()
    }
}
