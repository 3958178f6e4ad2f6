//! Trigger debouncer — turns motion and doorbell pulses into timed levels.
//!
//! Each `(device, kind)` pair holds at most one pending reset timer. A pulse
//! while the level is active aborts that timer and schedules a new one, so
//! the level drops exactly one reset window after the *last* pulse.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use minicam_domain::error::MiniCamError;
use minicam_domain::event::{Event, EventPayload};
use minicam_domain::id::NativeId;
use minicam_domain::trigger::{TriggerKind, TriggerState};

use crate::ports::EventPublisher;

type Key = (NativeId, TriggerKind);

struct Slot {
    generation: u64,
    deadline: Instant,
    timer: JoinHandle<()>,
}

type Slots = Arc<Mutex<HashMap<Key, Slot>>>;

pub struct TriggerDebouncer<P> {
    reset_window: Duration,
    publisher: P,
    slots: Slots,
    generation: AtomicU64,
}

impl<P> TriggerDebouncer<P>
where
    P: EventPublisher + Clone + Send + Sync + 'static,
{
    pub fn new(publisher: P, reset_window: Duration) -> Self {
        Self {
            reset_window,
            publisher,
            slots: Arc::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Register a pulse: raise the level if needed and push the reset
    /// deadline to `now + reset_window`.
    ///
    /// Returns `true` on a rising edge.
    ///
    /// # Errors
    ///
    /// Returns an error when the rising-edge notification cannot be published.
    #[tracing::instrument(skip(self, native_id), fields(native_id = %native_id))]
    pub async fn pulse(&self, native_id: NativeId, kind: TriggerKind) -> Result<bool, MiniCamError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let deadline = Instant::now() + self.reset_window;
        let key = (native_id.clone(), kind);

        let previous = {
            let mut slots = self.slots.lock().await;
            let timer = tokio::spawn(reset_after(
                Arc::clone(&self.slots),
                self.publisher.clone(),
                key.clone(),
                generation,
                deadline,
            ));
            slots.insert(
                key,
                Slot {
                    generation,
                    deadline,
                    timer,
                },
            )
        };

        if let Some(previous) = previous {
            previous.timer.abort();
            tracing::debug!("trigger extended");
            return Ok(false);
        }

        tracing::info!("trigger active");
        self.publisher
            .publish(Event::new(EventPayload::SensorChanged {
                native_id,
                kind,
                active: true,
            }))
            .await?;
        Ok(true)
    }

    /// Whether the level of `(native_id, kind)` is currently raised.
    pub async fn is_active(&self, native_id: &NativeId, kind: TriggerKind) -> bool {
        let now = Instant::now();
        self.slots
            .lock()
            .await
            .get(&(native_id.clone(), kind))
            .is_some_and(|slot| slot.deadline > now)
    }

    /// Every trigger currently raised.
    pub async fn active_triggers(&self) -> Vec<TriggerState> {
        let now = Instant::now();
        let mut active: Vec<TriggerState> = self
            .slots
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.deadline > now)
            .map(|((native_id, kind), slot)| {
                TriggerState::raised(native_id.clone(), *kind, slot.deadline - now)
            })
            .collect();
        active.sort_by(|a, b| a.native_id.cmp(&b.native_id));
        active
    }

    /// Drop the triggers of a removed device without notifying anyone.
    pub async fn forget(&self, native_id: &NativeId) {
        self.slots.lock().await.retain(|(id, _), slot| {
            if id == native_id {
                slot.timer.abort();
                false
            } else {
                true
            }
        });
    }

    /// Cancel every pending reset.
    pub async fn shutdown(&self) {
        for (_, slot) in self.slots.lock().await.drain() {
            slot.timer.abort();
        }
    }
}

impl<P> Drop for TriggerDebouncer<P> {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.slots.try_lock() {
            for (_, slot) in slots.drain() {
                slot.timer.abort();
            }
        }
    }
}

async fn reset_after<P: EventPublisher>(
    slots: Slots,
    publisher: P,
    key: Key,
    generation: u64,
    deadline: Instant,
) {
    tokio::time::sleep_until(deadline).await;

    let mut slots = slots.lock().await;
    if !slots
        .get(&key)
        .is_some_and(|slot| slot.generation == generation)
    {
        return;
    }
    slots.remove(&key);

    let (native_id, kind) = key;
    tracing::info!(%native_id, %kind, "trigger reset");
    let event = Event::new(EventPayload::SensorChanged {
        native_id,
        kind,
        active: false,
    });
    if let Err(err) = publisher.publish(event).await {
        tracing::warn!(error = %err, "failed to publish trigger reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    struct RecordingPublisher {
        events: Arc<StdMutex<Vec<EventPayload>>>,
    }

    impl RecordingPublisher {
        fn levels(&self) -> Vec<bool> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|payload| match payload {
                    EventPayload::SensorChanged { active, .. } => Some(*active),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: Event) -> impl Future<Output = Result<(), MiniCamError>> + Send {
            self.events.lock().unwrap().push(event.payload);
            async { Ok(()) }
        }
    }

    const WINDOW: Duration = Duration::from_secs(10);

    fn camera() -> NativeId {
        NativeId::parse("camA").unwrap()
    }

    fn debouncer() -> (TriggerDebouncer<RecordingPublisher>, RecordingPublisher) {
        let publisher = RecordingPublisher::default();
        (TriggerDebouncer::new(publisher.clone(), WINDOW), publisher)
    }

    #[tokio::test(start_paused = true)]
    async fn should_reset_after_window() {
        let (debouncer, publisher) = debouncer();

        assert!(debouncer.pulse(camera(), TriggerKind::Motion).await.unwrap());
        assert!(debouncer.is_active(&camera(), TriggerKind::Motion).await);

        tokio::time::sleep(WINDOW + Duration::from_millis(1)).await;

        assert!(!debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert_eq!(publisher.levels(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_extend_level_when_pulsed_again() {
        let (debouncer, publisher) = debouncer();

        debouncer.pulse(camera(), TriggerKind::Motion).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!debouncer.pulse(camera(), TriggerKind::Motion).await.unwrap());

        // 10.1s after the first pulse, 5.1s after the second
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert!(debouncer.is_active(&camera(), TriggerKind::Motion).await);

        // 14.9s after the first pulse
        tokio::time::sleep(Duration::from_millis(4_800)).await;
        assert!(debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert_eq!(publisher.levels(), vec![true]);

        // 15.1s after the first pulse
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert_eq!(publisher.levels(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_one_timer_under_repeated_pulses() {
        let (debouncer, publisher) = debouncer();

        for _ in 0..20 {
            debouncer.pulse(camera(), TriggerKind::Doorbell).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(debouncer.slots.lock().await.len(), 1);

        tokio::time::sleep(WINDOW).await;
        assert_eq!(publisher.levels(), vec![true, false]);
        assert!(debouncer.slots.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_track_kinds_independently() {
        let (debouncer, _) = debouncer();

        debouncer.pulse(camera(), TriggerKind::Motion).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        debouncer.pulse(camera(), TriggerKind::Doorbell).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(!debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert!(debouncer.is_active(&camera(), TriggerKind::Doorbell).await);
        let active = debouncer.active_triggers().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].native_id, camera());
        assert_eq!(active[0].kind, TriggerKind::Doorbell);
        assert!(active[0].active);
        // pulsed 6s ago with a 10s window
        assert!(active[0].remaining() <= Duration::from_secs(4));
        assert!(active[0].remaining() > Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn should_cancel_timers_when_device_forgotten() {
        let (debouncer, publisher) = debouncer();

        debouncer.pulse(camera(), TriggerKind::Motion).await.unwrap();
        debouncer.forget(&camera()).await;
        tokio::time::sleep(WINDOW * 2).await;

        assert!(!debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert_eq!(publisher.levels(), vec![true]);
    }

    #[derive(Clone)]
    struct GatedPublisher {
        gate: Arc<Notify>,
    }

    impl EventPublisher for GatedPublisher {
        fn publish(&self, _event: Event) -> impl Future<Output = Result<(), MiniCamError>> + Send {
            let gate = Arc::clone(&self.gate);
            async move {
                gate.notified().await;
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn should_serve_readers_while_rising_edge_is_published() {
        let gate = Arc::new(Notify::new());
        let debouncer = TriggerDebouncer::new(
            GatedPublisher {
                gate: Arc::clone(&gate),
            },
            WINDOW,
        );

        let (raised, ()) = tokio::join!(debouncer.pulse(camera(), TriggerKind::Motion), async {
            tokio::task::yield_now().await;
            assert!(debouncer.is_active(&camera(), TriggerKind::Motion).await);
            assert_eq!(debouncer.active_triggers().await.len(), 1);
            gate.notify_one();
        });

        assert!(raised.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_change_state_when_observed() {
        let (debouncer, publisher) = debouncer();

        assert!(!debouncer.is_active(&camera(), TriggerKind::Motion).await);
        assert!(debouncer.active_triggers().await.is_empty());
        assert!(publisher.levels().is_empty());
    }
}
