//! Stream session controller — outbound video and inbound intercom sessions.
//!
//! Every transport resource is wrapped in a [`TransportLease`] as soon as the
//! transport hands it out, so it is released exactly once whichever way the
//! session ends: explicit close, failed validation, cancellation while
//! negotiating, idle expiry, or the caller dropping the request future.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use minicam_domain::capability::Capability;
use minicam_domain::device::DeviceRecord;
use minicam_domain::error::MiniCamError;
use minicam_domain::id::{NativeId, SessionId};
use minicam_domain::media::{MediaDescriptor, StreamOptions};
use minicam_domain::stream::{
    Direction, SessionHandle, SessionState, StreamSession, TransportHandle,
};

use crate::config::ProviderConfig;
use crate::ports::{EventPublisher, MediaTransport};
use crate::services::device_registry::DeviceRegistry;

/// The transport did not answer within the negotiation deadline.
#[derive(Debug, thiserror::Error)]
#[error("transport negotiation did not finish within {0:?}")]
pub struct NegotiationTimeout(pub Duration);

/// Owns a transport resource and gives it back on drop.
struct TransportLease<T: MediaTransport> {
    transport: Arc<T>,
    handle: TransportHandle,
}

impl<T: MediaTransport> Drop for TransportLease<T> {
    fn drop(&mut self) {
        tracing::debug!(handle = %self.handle, "releasing transport resource");
        self.transport.release(&self.handle);
    }
}

struct SessionEntry<T: MediaTransport> {
    session: StreamSession,
    lease: Option<TransportLease<T>>,
    last_activity: Instant,
}

/// Serializes session bookkeeping; transport calls run outside the lock so
/// unrelated devices negotiate concurrently.
pub struct StreamController<T: MediaTransport, P> {
    registry: Arc<DeviceRegistry<P>>,
    transport: Arc<T>,
    max_concurrent_streams: usize,
    negotiate_timeout: Duration,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<SessionId, SessionEntry<T>>>,
}

impl<T: MediaTransport, P: EventPublisher> StreamController<T, P> {
    pub fn new(registry: Arc<DeviceRegistry<P>>, transport: Arc<T>, config: &ProviderConfig) -> Self {
        Self {
            registry,
            transport,
            max_concurrent_streams: config.max_concurrent_streams,
            negotiate_timeout: config.negotiate_timeout(),
            idle_timeout: config.stream_idle_timeout(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Negotiate an outbound video feed for `native_id`.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] when the device is unknown
    /// - [`MiniCamError::UnsupportedCapability`] without video streaming
    /// - [`MiniCamError::ResourceExhausted`] when the per-device cap is reached
    /// - [`MiniCamError::Transport`] when negotiation fails or times out
    /// - [`MiniCamError::Cancelled`] when the session was closed meanwhile
    #[tracing::instrument(skip(self, native_id, options), fields(native_id = %native_id))]
    pub async fn open_video_stream(
        &self,
        native_id: &NativeId,
        options: &StreamOptions,
    ) -> Result<SessionHandle, MiniCamError> {
        let device = self.registry.get(native_id).await?;
        device.require(Capability::VideoStream)?;
        let reservation = self.reserve(&device, Direction::OutboundVideo)?;

        let negotiated = tokio::time::timeout(
            self.negotiate_timeout,
            self.transport.negotiate_video(&device, options),
        )
        .await
        .map_err(|_| MiniCamError::transport(NegotiationTimeout(self.negotiate_timeout)))??;
        let lease = self.lease(negotiated.handle);
        negotiated
            .descriptor
            .validate()
            .map_err(MiniCamError::transport)?;

        let session_id = reservation.activate(lease)?;
        tracing::info!(%session_id, "video stream active");
        Ok(SessionHandle {
            session_id,
            native_id: device.native_id,
            direction: Direction::OutboundVideo,
            descriptor: negotiated.descriptor,
        })
    }

    /// Close the session behind `handle`. Closing twice is a no-op.
    pub fn close_stream(&self, handle: &SessionHandle) -> bool {
        self.close_session(handle.session_id)
    }

    /// Close a session by id, returning whether anything was open.
    ///
    /// A session still negotiating is flagged instead; its negotiation
    /// releases the resource on completion.
    pub fn close_session(&self, session_id: SessionId) -> bool {
        {
            let mut sessions = self.lock();
            match sessions.get_mut(&session_id) {
                None => return false,
                Some(entry) if entry.session.state() == SessionState::Negotiating => {
                    entry.session.request_cancel();
                    tracing::debug!(%session_id, "close requested while negotiating");
                    return true;
                }
                Some(_) => {}
            }
        }
        self.retire(session_id, SessionState::Closing)
    }

    /// Play the host audio described by `media` on the device speaker.
    ///
    /// # Errors
    ///
    /// - [`MiniCamError::NotFound`] when the device is unknown
    /// - [`MiniCamError::UnsupportedCapability`] without an intercom
    /// - [`MiniCamError::InvalidArgument`] when `media` has no input arguments
    /// - [`MiniCamError::SessionConflict`] when an intercom session is open
    /// - [`MiniCamError::Transport`] when the transport fails or times out
    #[tracing::instrument(skip(self, native_id, media), fields(native_id = %native_id))]
    pub async fn start_intercom(
        &self,
        native_id: &NativeId,
        media: &MediaDescriptor,
    ) -> Result<SessionId, MiniCamError> {
        let device = self.registry.get(native_id).await?;
        device.require(Capability::Intercom)?;
        media.validate()?;
        let reservation = self.reserve(&device, Direction::InboundAudio)?;

        let handle = tokio::time::timeout(
            self.negotiate_timeout,
            self.transport.open_intercom(&device, media),
        )
        .await
        .map_err(|_| MiniCamError::transport(NegotiationTimeout(self.negotiate_timeout)))??;
        let lease = self.lease(handle);

        let session_id = reservation.activate(lease)?;
        tracing::info!(%session_id, "intercom active");
        Ok(session_id)
    }

    /// Stop the intercom session of `native_id`, if any.
    pub fn stop_intercom(&self, native_id: &NativeId) -> bool {
        let session_id = self
            .lock()
            .values()
            .find(|entry| {
                entry.session.native_id == *native_id
                    && entry.session.direction == Direction::InboundAudio
            })
            .map(|entry| entry.session.id);
        session_id.is_some_and(|id| self.close_session(id))
    }

    /// Close every session of a device, e.g. when it disappears.
    pub fn close_device(&self, native_id: &NativeId) -> usize {
        let ids: Vec<SessionId> = self
            .lock()
            .values()
            .filter(|entry| entry.session.native_id == *native_id)
            .map(|entry| entry.session.id)
            .collect();
        ids.into_iter().filter(|id| self.close_session(*id)).count()
    }

    /// Close every session.
    pub fn shutdown(&self) {
        let ids: Vec<SessionId> = self.lock().keys().copied().collect();
        let closed = ids.into_iter().filter(|id| self.close_session(*id)).count();
        tracing::info!(closed, "stream controller shut down");
    }

    /// Mark an active session as in use, postponing its idle expiry.
    pub fn touch(&self, session_id: SessionId) -> bool {
        match self.lock().get_mut(&session_id) {
            Some(entry) if entry.session.state() == SessionState::Active => {
                entry.last_activity = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Close every active session idle for longer than the idle timeout.
    pub fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<SessionId> = self
            .lock()
            .values()
            .filter(|entry| {
                entry.session.state() == SessionState::Active
                    && now.saturating_duration_since(entry.last_activity) >= self.idle_timeout
            })
            .map(|entry| entry.session.id)
            .collect();
        let reaped = expired
            .into_iter()
            .filter(|id| self.retire(*id, SessionState::Closing))
            .count();
        if reaped > 0 {
            tracing::info!(reaped, "closed idle sessions");
        }
        reaped
    }

    /// Snapshot of the sessions of one device.
    pub fn sessions_for(&self, native_id: &NativeId) -> Vec<StreamSession> {
        self.lock()
            .values()
            .filter(|entry| entry.session.native_id == *native_id)
            .map(|entry| entry.session.clone())
            .collect()
    }

    fn lease(&self, handle: TransportHandle) -> TransportLease<T> {
        TransportLease {
            transport: Arc::clone(&self.transport),
            handle,
        }
    }

    /// Claim a slot for a new session, enforcing the per-device limits.
    fn reserve(
        &self,
        device: &DeviceRecord,
        direction: Direction,
    ) -> Result<Reservation<'_, T, P>, MiniCamError> {
        self.reap_idle();
        let mut sessions = self.lock();
        let live = sessions
            .values()
            .filter(|entry| {
                entry.session.native_id == device.native_id
                    && entry.session.direction == direction
                    && entry.session.state().is_live()
            })
            .count();
        match direction {
            Direction::OutboundVideo if live >= self.max_concurrent_streams => {
                return Err(MiniCamError::ResourceExhausted {
                    native_id: device.native_id.clone(),
                    limit: self.max_concurrent_streams,
                });
            }
            Direction::InboundAudio if live > 0 => {
                return Err(MiniCamError::SessionConflict {
                    native_id: device.native_id.clone(),
                });
            }
            _ => {}
        }

        let session = StreamSession::begin(device.native_id.clone(), direction);
        let session_id = session.id;
        sessions.insert(
            session_id,
            SessionEntry {
                session,
                lease: None,
                last_activity: Instant::now(),
            },
        );
        Ok(Reservation {
            controller: self,
            session_id,
            armed: true,
        })
    }

    /// Remove a session and walk it back to idle through `via`.
    fn retire(&self, session_id: SessionId, via: SessionState) -> bool {
        let entry = self.lock().remove(&session_id);
        let Some(mut entry) = entry else {
            return false;
        };
        for next in [via, SessionState::Idle] {
            if let Err(err) = entry.session.advance(next) {
                tracing::warn!(%session_id, error = %err, "unexpected session transition");
            }
        }
        tracing::debug!(
            %session_id,
            direction = %entry.session.direction,
            released = entry.lease.is_some(),
            "session retired"
        );
        true
    }
}

impl<T: MediaTransport, P> StreamController<T, P> {
    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry<T>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A slot claimed in the session table. Dropping it unactivated marks the
/// session failed and frees the slot.
struct Reservation<'a, T: MediaTransport, P> {
    controller: &'a StreamController<T, P>,
    session_id: SessionId,
    armed: bool,
}

impl<T: MediaTransport, P> Reservation<'_, T, P> {
    fn activate(mut self, lease: TransportLease<T>) -> Result<SessionId, MiniCamError> {
        self.armed = false;
        let session_id = self.session_id;
        let mut sessions = self.controller.lock();
        let cancelled = match sessions.get_mut(&session_id) {
            Some(entry) if !entry.session.is_cancel_requested() => {
                entry
                    .session
                    .advance(SessionState::Active)
                    .map_err(MiniCamError::transport)?;
                entry.lease = Some(lease);
                entry.last_activity = Instant::now();
                return Ok(session_id);
            }
            _ => sessions.remove(&session_id),
        };
        drop(sessions);

        if let Some(mut entry) = cancelled {
            for next in [SessionState::Closing, SessionState::Idle] {
                if let Err(err) = entry.session.advance(next) {
                    tracing::warn!(%session_id, error = %err, "unexpected session transition");
                }
            }
        }
        tracing::info!(%session_id, "session closed while negotiating");
        drop(lease);
        Err(MiniCamError::Cancelled)
    }
}

impl<T: MediaTransport, P> Drop for Reservation<'_, T, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let entry = self.controller.lock().remove(&self.session_id);
        if let Some(mut entry) = entry {
            for next in [SessionState::Failed, SessionState::Idle] {
                if let Err(err) = entry.session.advance(next) {
                    tracing::warn!(session_id = %self.session_id, error = %err, "unexpected session transition");
                }
            }
            tracing::debug!(session_id = %self.session_id, "negotiation failed, slot freed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::InProcessEventBus;
    use crate::ports::Negotiated;
    use minicam_domain::capability::CapabilitySet;
    use minicam_domain::error::{NotFoundError, ValidationError};
    use minicam_domain::media::{Picture, PictureOptions, ResponseStreamOptions};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeTransport {
        counter: AtomicUsize,
        released: Mutex<Vec<TransportHandle>>,
        fail_negotiation: AtomicBool,
        empty_descriptor: AtomicBool,
        gate: Option<Arc<Notify>>,
    }

    impl FakeTransport {
        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::default()
            }
        }

        fn released(&self) -> Vec<TransportHandle> {
            self.released.lock().unwrap().clone()
        }

        async fn next_handle(&self, prefix: &str) -> Result<TransportHandle, MiniCamError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_negotiation.load(Ordering::SeqCst) {
                return Err(MiniCamError::transport("upstream refused the stream"));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(TransportHandle::new(format!("{prefix}-{n}")))
        }
    }

    impl MediaTransport for FakeTransport {
        async fn negotiate_video(
            &self,
            _device: &DeviceRecord,
            _options: &StreamOptions,
        ) -> Result<Negotiated, MiniCamError> {
            let handle = self.next_handle("video").await?;
            let arguments = if self.empty_descriptor.load(Ordering::SeqCst) {
                vec![]
            } else {
                vec!["-i".to_string(), "dog.mp4".to_string()]
            };
            Ok(Negotiated {
                handle,
                descriptor: MediaDescriptor::new(arguments),
            })
        }

        async fn open_intercom(
            &self,
            _device: &DeviceRecord,
            _media: &MediaDescriptor,
        ) -> Result<TransportHandle, MiniCamError> {
            self.next_handle("audio").await
        }

        fn release(&self, handle: &TransportHandle) {
            self.released.lock().unwrap().push(handle.clone());
        }

        async fn stream_options(
            &self,
            _device: &DeviceRecord,
        ) -> Result<Vec<ResponseStreamOptions>, MiniCamError> {
            Ok(vec![])
        }

        async fn take_picture(
            &self,
            _device: &DeviceRecord,
            _options: &PictureOptions,
        ) -> Result<Picture, MiniCamError> {
            Err(MiniCamError::transport("no snapshots"))
        }
    }

    type Controller = StreamController<FakeTransport, InProcessEventBus>;

    fn id(raw: &str) -> NativeId {
        NativeId::parse(raw).unwrap()
    }

    fn device(raw: &str, capabilities: CapabilitySet) -> DeviceRecord {
        DeviceRecord::builder()
            .native_id(id(raw))
            .capabilities(capabilities)
            .build()
            .unwrap()
    }

    async fn controller(transport: FakeTransport) -> (Controller, Arc<DeviceRegistry<InProcessEventBus>>) {
        let registry = Arc::new(DeviceRegistry::new(InProcessEventBus::new(16)));
        registry
            .discover(vec![
                device("camA", CapabilitySet::camera()),
                device("door", CapabilitySet::doorbell()),
                device("still", [Capability::Camera].into_iter().collect()),
            ])
            .await
            .unwrap();
        let controller = StreamController::new(
            Arc::clone(&registry),
            Arc::new(transport),
            &ProviderConfig::default(),
        );
        (controller, registry)
    }

    fn audio() -> MediaDescriptor {
        MediaDescriptor::new(vec!["-f".to_string(), "s16le".to_string()])
    }

    #[tokio::test]
    async fn should_open_active_video_stream() {
        let (controller, _) = controller(FakeTransport::default()).await;

        let handle = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await
            .unwrap();

        assert_eq!(handle.native_id, id("camA"));
        assert_eq!(handle.descriptor.input_arguments, vec!["-i", "dog.mp4"]);
        let sessions = controller.sessions_for(&id("camA"));
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].state(), SessionState::Active);
    }

    #[tokio::test]
    async fn should_reject_stream_on_device_without_video() {
        let (controller, _) = controller(FakeTransport::default()).await;

        let result = controller
            .open_video_stream(&id("still"), &StreamOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(MiniCamError::UnsupportedCapability {
                capability: Capability::VideoStream,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_device() {
        let (controller, _) = controller(FakeTransport::default()).await;

        let result = controller
            .open_video_stream(&id("ghost"), &StreamOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(MiniCamError::NotFound(NotFoundError { .. }))
        ));
    }

    #[tokio::test]
    async fn should_see_capabilities_after_update() {
        let (controller, registry) = controller(FakeTransport::default()).await;
        registry
            .apply_capability_change(&id("camA"), [Capability::Camera].into_iter().collect())
            .await
            .unwrap();

        let result = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(MiniCamError::UnsupportedCapability { .. })
        ));
    }

    #[tokio::test]
    async fn should_see_consistent_capabilities_when_updated_concurrently() {
        let (controller, registry) = controller(FakeTransport::default()).await;
        let camera = id("camA");
        let options = StreamOptions::default();
        let without_video: CapabilitySet = [Capability::Camera].into_iter().collect();

        let (first, changed, second) = tokio::join!(
            controller.open_video_stream(&camera, &options),
            registry.apply_capability_change(&camera, without_video),
            controller.open_video_stream(&camera, &options),
        );
        assert!(changed.unwrap());

        let mut opened = Vec::new();
        for result in [first, second] {
            match result {
                Ok(handle) => opened.push(handle.session_id),
                Err(MiniCamError::UnsupportedCapability {
                    capability: Capability::VideoStream,
                    ..
                }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        let live: Vec<SessionId> = controller
            .sessions_for(&camera)
            .into_iter()
            .filter(|session| session.state() == SessionState::Active)
            .map(|session| session.id)
            .collect();
        assert_eq!(live.len(), opened.len());
        assert!(opened.iter().all(|id| live.contains(id)));

        let after = controller.open_video_stream(&camera, &options).await;
        assert!(matches!(
            after,
            Err(MiniCamError::UnsupportedCapability { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_close_idle_streams_when_timeout_elapses() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let options = StreamOptions::default();
        controller.open_video_stream(&id("camA"), &options).await.unwrap();
        controller.open_video_stream(&id("camA"), &options).await.unwrap();

        tokio::time::advance(ProviderConfig::default().stream_idle_timeout() + Duration::from_secs(1)).await;

        let third = controller.open_video_stream(&id("camA"), &options).await;
        assert!(third.is_ok());
        let released = controller.transport.released();
        assert_eq!(released.len(), 2);
        assert!(released.contains(&TransportHandle::new("video-0")));
        assert!(released.contains(&TransportHandle::new("video-1")));
        assert_eq!(controller.sessions_for(&id("camA")).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_touched_stream_alive() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let idle = ProviderConfig::default().stream_idle_timeout();
        let handle = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await
            .unwrap();

        tokio::time::advance(idle - Duration::from_secs(1)).await;
        assert!(controller.touch(handle.session_id));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(controller.reap_idle(), 0);

        tokio::time::advance(idle).await;
        assert_eq!(controller.reap_idle(), 1);
        assert!(!controller.touch(handle.session_id));
        assert!(!controller.close_stream(&handle));
        assert_eq!(controller.transport.released(), vec![TransportHandle::new("video-0")]);
    }

    #[tokio::test]
    async fn should_enforce_stream_cap_per_device() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let options = StreamOptions::default();

        let first = controller.open_video_stream(&id("camA"), &options).await.unwrap();
        controller.open_video_stream(&id("camA"), &options).await.unwrap();
        let third = controller.open_video_stream(&id("camA"), &options).await;
        assert!(matches!(
            third,
            Err(MiniCamError::ResourceExhausted { limit: 2, .. })
        ));

        // other devices are unaffected
        controller.open_video_stream(&id("door"), &options).await.unwrap();

        controller.close_stream(&first);
        controller.open_video_stream(&id("camA"), &options).await.unwrap();
    }

    #[tokio::test]
    async fn should_release_exactly_once_when_closed_twice() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let handle = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await
            .unwrap();

        assert!(controller.close_stream(&handle));
        assert!(!controller.close_stream(&handle));

        assert_eq!(controller.transport.released(), vec![TransportHandle::new("video-0")]);
        assert!(controller.sessions_for(&id("camA")).is_empty());
    }

    #[tokio::test]
    async fn should_free_slot_when_negotiation_fails() {
        let transport = FakeTransport::default();
        transport.fail_negotiation.store(true, Ordering::SeqCst);
        let (controller, _) = controller(transport).await;

        let result = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await;

        assert!(matches!(result, Err(MiniCamError::Transport(_))));
        assert!(controller.sessions_for(&id("camA")).is_empty());
        assert!(controller.transport.released().is_empty());
    }

    #[tokio::test]
    async fn should_release_once_when_descriptor_is_invalid() {
        let transport = FakeTransport::default();
        transport.empty_descriptor.store(true, Ordering::SeqCst);
        let (controller, _) = controller(transport).await;

        let result = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await;

        assert!(matches!(result, Err(MiniCamError::Transport(_))));
        assert_eq!(controller.transport.released(), vec![TransportHandle::new("video-0")]);
        assert!(controller.sessions_for(&id("camA")).is_empty());
    }

    #[tokio::test]
    async fn should_release_when_closed_during_negotiation() {
        let gate = Arc::new(Notify::new());
        let (controller, _) = controller(FakeTransport::gated(Arc::clone(&gate))).await;
        let camera = id("camA");
        let options = StreamOptions::default();

        let (opened, ()) = tokio::join!(
            controller.open_video_stream(&camera, &options),
            async {
                tokio::task::yield_now().await;
                let sessions = controller.sessions_for(&id("camA"));
                assert_eq!(sessions[0].state(), SessionState::Negotiating);
                assert!(controller.close_session(sessions[0].id));
                gate.notify_one();
            }
        );

        assert!(matches!(opened, Err(MiniCamError::Cancelled)));
        assert_eq!(controller.transport.released(), vec![TransportHandle::new("video-0")]);
        assert!(controller.sessions_for(&id("camA")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_stalled_negotiation() {
        let gate = Arc::new(Notify::new());
        let (controller, _) = controller(FakeTransport::gated(gate)).await;

        let result = controller
            .open_video_stream(&id("camA"), &StreamOptions::default())
            .await;

        assert!(matches!(result, Err(MiniCamError::Transport(_))));
        assert!(controller.sessions_for(&id("camA")).is_empty());
    }

    #[tokio::test]
    async fn should_allow_only_one_concurrent_intercom() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let media = audio();
        let door = id("door");

        let (first, second) = tokio::join!(
            controller.start_intercom(&door, &media),
            controller.start_intercom(&door, &media),
        );

        let conflicts = [&first, &second]
            .iter()
            .filter(|result| matches!(result, Err(MiniCamError::SessionConflict { .. })))
            .count();
        assert_eq!(conflicts, 1);
        assert!(first.is_ok() || second.is_ok());
    }

    #[tokio::test]
    async fn should_reject_intercom_on_plain_camera() {
        let (controller, _) = controller(FakeTransport::default()).await;

        let result = controller.start_intercom(&id("camA"), &audio()).await;

        assert!(matches!(
            result,
            Err(MiniCamError::UnsupportedCapability {
                capability: Capability::Intercom,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn should_reject_intercom_with_empty_descriptor() {
        let (controller, _) = controller(FakeTransport::default()).await;

        let result = controller
            .start_intercom(&id("door"), &MediaDescriptor::new(vec![]))
            .await;

        assert!(matches!(
            result,
            Err(MiniCamError::InvalidArgument(
                ValidationError::EmptyMediaDescriptor
            ))
        ));
    }

    #[tokio::test]
    async fn should_stop_intercom_idempotently() {
        let (controller, _) = controller(FakeTransport::default()).await;
        controller.start_intercom(&id("door"), &audio()).await.unwrap();

        assert!(controller.stop_intercom(&id("door")));
        assert!(!controller.stop_intercom(&id("door")));
        assert_eq!(controller.transport.released(), vec![TransportHandle::new("audio-0")]);

        controller.start_intercom(&id("door"), &audio()).await.unwrap();
    }

    #[tokio::test]
    async fn should_surface_intercom_transport_failure() {
        let transport = FakeTransport::default();
        transport.fail_negotiation.store(true, Ordering::SeqCst);
        let (controller, _) = controller(transport).await;

        let result = controller.start_intercom(&id("door"), &audio()).await;

        assert!(matches!(result, Err(MiniCamError::Transport(_))));
        assert!(controller.sessions_for(&id("door")).is_empty());
    }

    #[tokio::test]
    async fn should_close_every_session_of_a_device() {
        let (controller, _) = controller(FakeTransport::default()).await;
        let options = StreamOptions::default();
        controller.open_video_stream(&id("door"), &options).await.unwrap();
        controller.start_intercom(&id("door"), &audio()).await.unwrap();
        controller.open_video_stream(&id("camA"), &options).await.unwrap();

        assert_eq!(controller.close_device(&id("door")), 2);

        assert_eq!(controller.transport.released().len(), 2);
        assert_eq!(controller.sessions_for(&id("camA")).len(), 1);

        controller.shutdown();
        assert_eq!(controller.transport.released().len(), 3);
    }
}
