//! Camera provider — the facade the host platform calls.
//!
//! Wires the four services together and owns the background worker that
//! reacts to credential changes and upstream motion / doorbell pulses. The
//! worker starts on the first inbound call and stops on [`CameraProvider::shutdown`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use minicam_domain::capability::{Capability, CapabilitySet};
use minicam_domain::credential::{AccessToken, AuthStatus, LoginOutcome, Secret};
use minicam_domain::device::DeviceRecord;
use minicam_domain::error::{MiniCamError, UpstreamError, ValidationError};
use minicam_domain::id::{NativeId, SessionId};
use minicam_domain::media::{
    MediaDescriptor, Picture, PictureOptions, ResponseStreamOptions, StreamOptions,
};
use minicam_domain::setting::{self, AccountSetting, Setting};
use minicam_domain::stream::SessionHandle;
use minicam_domain::trigger::{TriggerKind, TriggerState};

use crate::config::ProviderConfig;
use crate::ports::{
    EventPublisher, MediaTransport, SettingsStore, UpstreamAccount, UpstreamCamera, UpstreamEvent,
};
use crate::services::credential_manager::CredentialManager;
use crate::services::device_registry::{DeviceRegistry, DiffResult};
use crate::services::stream_controller::StreamController;
use crate::services::trigger_debouncer::TriggerDebouncer;

/// Shown instead of the stored password.
const PASSWORD_MASK: &str = "********";

struct Inner<U, T, S, P>
where
    T: MediaTransport,
{
    config: ProviderConfig,
    upstream: Arc<U>,
    transport: Arc<T>,
    settings: S,
    registry: Arc<DeviceRegistry<Arc<P>>>,
    credentials: CredentialManager<U>,
    streams: StreamController<T, Arc<P>>,
    debouncer: TriggerDebouncer<Arc<P>>,
    /// Serializes discovery and the logins it may trigger.
    discovery: Mutex<()>,
}

/// Device provider exposing cameras of one upstream account to the host.
pub struct CameraProvider<U, T, S, P>
where
    U: UpstreamAccount,
    T: MediaTransport,
    S: SettingsStore,
    P: EventPublisher + Send + Sync + 'static,
{
    inner: Arc<Inner<U, T, S, P>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<U, T, S, P> CameraProvider<U, T, S, P>
where
    U: UpstreamAccount,
    T: MediaTransport,
    S: SettingsStore,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(
        config: ProviderConfig,
        upstream: Arc<U>,
        transport: Arc<T>,
        settings: S,
        publisher: Arc<P>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(Arc::clone(&publisher)));
        let credentials = CredentialManager::new(Arc::clone(&upstream), &config);
        let streams = StreamController::new(Arc::clone(&registry), Arc::clone(&transport), &config);
        let debouncer = TriggerDebouncer::new(publisher, config.trigger_reset_window());
        Self {
            inner: Arc::new(Inner {
                config,
                upstream,
                transport,
                settings,
                registry,
                credentials,
                streams,
                debouncer,
                discovery: Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the background worker if it is not running yet.
    pub async fn ensure_started(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let invalidations = self.inner.credentials.subscribe_invalidations();
        let events = self.inner.upstream.subscribe_events();
        *worker = Some(tokio::spawn(run(
            Arc::clone(&self.inner),
            invalidations,
            events,
        )));
        tracing::info!("provider worker started");
    }

    /// Stop the worker, close every session, cancel trigger timers and log out.
    pub async fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
        }
        self.inner.streams.shutdown();
        self.inner.debouncer.shutdown().await;
        self.inner.credentials.invalidate().await;
        tracing::info!("provider shut down");
    }

    /// Reconcile the registry with the cameras of the upstream account.
    ///
    /// A non-zero `duration` overrides the upstream timeout.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::UpstreamUnavailable`] when not logged in (including
    ///   while a second factor is pending) or the upstream cannot be reached;
    ///   the registry keeps its current devices
    /// - [`MiniCamError::LoginFailed`] when the stored credentials are refused
    /// - [`MiniCamError::AuthRejected`] when the upstream drops the session
    pub async fn discover_devices(&self, duration: Duration) -> Result<DiffResult, MiniCamError> {
        self.ensure_started().await;
        self.inner.discover(duration).await
    }

    /// Return the device, creating a placeholder for an unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] for an empty id.
    pub async fn get_device(&self, native_id: &str) -> Result<DeviceRecord, MiniCamError> {
        self.ensure_started().await;
        self.inner.registry.get_or_create(native_id).await
    }

    /// Every known device.
    pub async fn devices(&self) -> Vec<DeviceRecord> {
        self.inner.registry.list().await
    }

    #[must_use]
    pub fn get_create_device_settings(&self) -> Vec<Setting> {
        setting::create_device_settings()
    }

    /// Register a manually added camera under a fresh id.
    ///
    /// # Errors
    ///
    /// Propagates publishing failures from the registry.
    #[tracing::instrument(skip_all)]
    pub async fn create_device(
        &self,
        settings: &HashMap<String, String>,
    ) -> Result<NativeId, MiniCamError> {
        self.ensure_started().await;
        let native_id = NativeId::random();
        let mut builder = DeviceRecord::builder()
            .native_id(native_id.clone())
            .capabilities(CapabilitySet::basic_camera());
        if let Some(name) = settings
            .get(setting::DEVICE_NAME)
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
        {
            builder = builder.name(name);
        }
        self.inner.registry.create(builder.build()?).await?;
        tracing::info!(%native_id, "device created");
        Ok(native_id)
    }

    /// Account settings; the password is masked and the second-factor code
    /// is never returned.
    ///
    /// # Errors
    ///
    /// Propagates settings store failures.
    pub async fn get_settings(&self) -> Result<Vec<Setting>, MiniCamError> {
        let email = self.inner.settings.get(setting::EMAIL).await?;
        let password = self
            .inner
            .settings
            .get(setting::PASSWORD)
            .await?
            .map(|_| PASSWORD_MASK.to_string());
        Ok(vec![
            AccountSetting::Email.describe(email),
            AccountSetting::Password.describe(password),
            AccountSetting::TwoFactorCode.describe(None),
        ])
    }

    /// Update an account setting.
    ///
    /// Changing the email or password logs out and triggers rediscovery. The
    /// second-factor code completes a pending login and then discovers.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::InvalidArgument`] for an unknown key or empty code
    /// - [`MiniCamError::LoginFailed`] when the upstream refuses the code
    /// - [`MiniCamError::ChallengeExpired`] when the code arrived too late
    #[tracing::instrument(skip(self, value))]
    pub async fn put_setting(&self, key: &str, value: Option<String>) -> Result<(), MiniCamError> {
        self.ensure_started().await;
        let account_setting = AccountSetting::parse(key)?;
        if account_setting.invalidates_session() {
            self.inner.settings.put(key, value).await?;
            self.inner.credentials.invalidate().await;
            return Ok(());
        }

        let code = value
            .filter(|code| !code.trim().is_empty())
            .ok_or(ValidationError::EmptyField {
                field: "two factor code",
            })?;
        let result = self.inner.complete_login(code.trim()).await;
        if let Err(err) = &result {
            tracing::error!(error = %err, alert = %err.user_message(), "login failed");
        }
        result.map(|_| ())
    }

    /// Grab a still image.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] / [`MiniCamError::UnsupportedCapability`]
    /// - [`MiniCamError::Transport`] when the snapshot fails or times out
    pub async fn take_picture(
        &self,
        native_id: &str,
        options: &PictureOptions,
    ) -> Result<Picture, MiniCamError> {
        self.ensure_started().await;
        let device = self.inner.device_with(native_id, Capability::Camera).await?;
        tokio::time::timeout(
            self.inner.config.negotiate_timeout(),
            self.inner.transport.take_picture(&device, options),
        )
        .await
        .map_err(|_| MiniCamError::transport("snapshot timed out"))?
    }

    /// Resolutions a picture can be taken at; empty when the upstream does
    /// not tell.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] / [`MiniCamError::UnsupportedCapability`]
    pub async fn get_picture_options(&self, native_id: &str) -> Result<Vec<PictureOptions>, MiniCamError> {
        self.inner.device_with(native_id, Capability::Camera).await?;
        Ok(Vec::new())
    }

    /// Open an outbound video stream. Close it with
    /// [`CameraProvider::close_video_stream`].
    ///
    /// # Errors
    ///
    /// See [`StreamController::open_video_stream`].
    pub async fn get_video_stream(
        &self,
        native_id: &str,
        options: &StreamOptions,
    ) -> Result<SessionHandle, MiniCamError> {
        self.ensure_started().await;
        let native_id = NativeId::parse(native_id)?;
        self.inner.streams.open_video_stream(&native_id, options).await
    }

    /// Close a stream; closing twice is a no-op.
    pub fn close_video_stream(&self, handle: &SessionHandle) -> bool {
        self.inner.streams.close_stream(handle)
    }

    /// Report activity on a stream so it is not closed as idle.
    pub fn keep_alive_video_stream(&self, handle: &SessionHandle) -> bool {
        self.inner.streams.touch(handle.session_id)
    }

    /// Stream variants the device advertises.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] / [`MiniCamError::UnsupportedCapability`]
    /// - [`MiniCamError::Transport`] when the transport does not answer in time
    pub async fn get_video_stream_options(
        &self,
        native_id: &str,
    ) -> Result<Vec<ResponseStreamOptions>, MiniCamError> {
        self.ensure_started().await;
        let device = self.inner.device_with(native_id, Capability::VideoStream).await?;
        tokio::time::timeout(
            self.inner.config.negotiate_timeout(),
            self.inner.transport.stream_options(&device),
        )
        .await
        .map_err(|_| MiniCamError::transport("stream options timed out"))?
    }

    /// Play host audio on the device speaker. `media` is the JSON encoded
    /// [`MediaDescriptor`] handed over by the host.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::InvalidArgument`] for a malformed descriptor
    /// - see [`StreamController::start_intercom`]
    pub async fn start_intercom(&self, native_id: &str, media: &[u8]) -> Result<SessionId, MiniCamError> {
        self.ensure_started().await;
        let native_id = NativeId::parse(native_id)?;
        let media = MediaDescriptor::from_json(media)?;
        self.inner.streams.start_intercom(&native_id, &media).await
    }

    /// Stop the intercom of a device; a no-op when none is running.
    ///
    /// # Errors
    ///
    /// Returns [`MiniCamError::InvalidArgument`] for an empty id.
    pub fn stop_intercom(&self, native_id: &str) -> Result<bool, MiniCamError> {
        let native_id = NativeId::parse(native_id)?;
        Ok(self.inner.streams.stop_intercom(&native_id))
    }

    /// Feed a motion or doorbell pulse reported outside the upstream feed.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] for an unknown device
    /// - [`MiniCamError::UnsupportedCapability`] when the device has no such sensor
    pub async fn handle_event(&self, event: UpstreamEvent) -> Result<bool, MiniCamError> {
        self.inner.handle_event(event).await
    }

    /// Whether a motion or doorbell level is currently raised.
    pub async fn is_triggered(&self, native_id: &NativeId, kind: TriggerKind) -> bool {
        self.inner.debouncer.is_active(native_id, kind).await
    }

    pub async fn active_triggers(&self) -> Vec<TriggerState> {
        self.inner.debouncer.active_triggers().await
    }

    pub async fn auth_status(&self) -> AuthStatus {
        self.inner.credentials.status().await
    }
}

impl<U, T, S, P> Drop for CameraProvider<U, T, S, P>
where
    U: UpstreamAccount,
    T: MediaTransport,
    S: SettingsStore,
    P: EventPublisher + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.abort();
        }
    }
}

impl<U, T, S, P> Inner<U, T, S, P>
where
    U: UpstreamAccount,
    T: MediaTransport,
    S: SettingsStore,
    P: EventPublisher + Send + Sync + 'static,
{
    async fn device_with(
        &self,
        native_id: &str,
        capability: Capability,
    ) -> Result<DeviceRecord, MiniCamError> {
        let device = self.registry.get(&NativeId::parse(native_id)?).await?;
        device.require(capability)?;
        Ok(device)
    }

    async fn discover(&self, duration: Duration) -> Result<DiffResult, MiniCamError> {
        let _discovery = self.discovery.lock().await;
        self.discover_locked(duration).await
    }

    #[tracing::instrument(skip(self))]
    async fn discover_locked(&self, duration: Duration) -> Result<DiffResult, MiniCamError> {
        let token = self.session_token().await?;
        let deadline = if duration.is_zero() {
            self.config.upstream_timeout()
        } else {
            duration
        };

        let listing = async {
            let cameras = tokio::time::timeout(deadline, self.upstream.list_cameras(&token))
                .await
                .map_err(|_| UpstreamError::Timeout)??;
            cameras
                .into_iter()
                .map(UpstreamCamera::into_record)
                .collect::<Result<Vec<_>, _>>()
        };
        let diff = match self.registry.discover_from(listing).await {
            Err(MiniCamError::AuthRejected) => {
                self.credentials.expire_session().await;
                return Err(MiniCamError::AuthRejected);
            }
            other => other?,
        };

        for native_id in &diff.removed {
            let closed = self.streams.close_device(native_id);
            self.debouncer.forget(native_id).await;
            tracing::debug!(%native_id, closed, "removed device cleaned up");
        }
        tracing::info!(
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len(),
            "discovered devices"
        );
        Ok(diff)
    }

    /// Return an access token, logging in with the stored credentials when
    /// logged out.
    async fn session_token(&self) -> Result<AccessToken, MiniCamError> {
        match self.credentials.status().await {
            AuthStatus::LoggedIn => {}
            AuthStatus::AwaitingChallenge => {
                tracing::info!("waiting for the two factor code");
                return Err(UpstreamError::NotLoggedIn.into());
            }
            AuthStatus::LoggedOut => match self.login_with_stored().await? {
                LoginOutcome::Success => {}
                LoginOutcome::ChallengeRequired => return Err(UpstreamError::NotLoggedIn.into()),
                LoginOutcome::Failure { reason } => return Err(MiniCamError::LoginFailed { reason }),
            },
        }
        self.credentials.access_token().await
    }

    async fn login_with_stored(&self) -> Result<LoginOutcome, MiniCamError> {
        let email = self.settings.get(setting::EMAIL).await?;
        let password = self.settings.get(setting::PASSWORD).await?;
        let (Some(email), Some(password)) = (email, password) else {
            tracing::debug!("no stored credentials");
            return Err(UpstreamError::NotLoggedIn.into());
        };
        self.credentials.login(&email, Secret::new(password)).await
    }

    /// Answer the second factor, logging in first if no challenge is
    /// pending, then discover.
    async fn complete_login(&self, code: &str) -> Result<DiffResult, MiniCamError> {
        let _discovery = self.discovery.lock().await;
        let outcome = if self.credentials.challenge_pending().await {
            self.credentials.submit_challenge(code).await?
        } else if self.credentials.status().await == AuthStatus::LoggedIn {
            LoginOutcome::Success
        } else {
            match self.login_with_stored().await? {
                LoginOutcome::ChallengeRequired => self.credentials.submit_challenge(code).await?,
                other => other,
            }
        };
        match outcome {
            LoginOutcome::Success => self.discover_locked(Duration::ZERO).await,
            LoginOutcome::ChallengeRequired => Err(MiniCamError::LoginFailed {
                reason: "two factor code was not accepted".to_string(),
            }),
            LoginOutcome::Failure { reason } => Err(MiniCamError::LoginFailed { reason }),
        }
    }

    async fn handle_event(&self, event: UpstreamEvent) -> Result<bool, MiniCamError> {
        let device = self.registry.get(&event.native_id).await?;
        device.require(event.kind.capability())?;
        self.debouncer.pulse(event.native_id, event.kind).await
    }

    async fn rediscover(&self) {
        if let Err(err) = self.discover(Duration::ZERO).await {
            if err.requires_credentials() {
                tracing::error!(error = %err, alert = %err.user_message(), "discovery failed");
            } else {
                tracing::warn!(error = %err, "discovery failed");
            }
        }
    }
}

/// Worker loop: initial discovery, rediscovery on credential invalidation,
/// the upstream event feed and the idle session sweep.
async fn run<U, T, S, P>(
    inner: Arc<Inner<U, T, S, P>>,
    mut invalidations: watch::Receiver<u64>,
    mut events: broadcast::Receiver<UpstreamEvent>,
) where
    U: UpstreamAccount,
    T: MediaTransport,
    S: SettingsStore,
    P: EventPublisher + Send + Sync + 'static,
{
    inner.rediscover().await;

    let period = inner.config.stream_sweep_interval();
    let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut feed_open = true;
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                inner.streams.reap_idle();
            }
            changed = invalidations.changed() => {
                if changed.is_err() {
                    break;
                }
                inner.rediscover().await;
            }
            received = events.recv(), if feed_open => match received {
                Ok(event) => {
                    if let Err(err) = inner.handle_event(event).await {
                        tracing::warn!(error = %err, "ignored upstream event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "upstream event feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("upstream event feed closed");
                    feed_open = false;
                }
            },
        }
    }
}
