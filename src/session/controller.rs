use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{error, info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    distance::total_distance,
    error::{TrackingError, TrackingResult},
    location::{request_fix, Fix, LocationError, LocationProvider},
    models::{ActivityType, LocationSample, SessionRecord},
    persistence::{PersistenceQueue, QueueListener, SessionStore, SessionSummary},
    sampling::{ErrorCallback, LocationSampler, SampleCallback, SamplerHandle},
    settings::TrackerSettings,
};

use super::{events::EventBus, SessionState, TrackerEvent, TrackerSnapshot};

#[derive(Default)]
struct Inner {
    state: SessionState,
    record: Option<SessionRecord>,
    last_error: Option<TrackingError>,
    /// Bumped on every start and abandon so a pending start can tell it lost.
    attempt: u64,
    sampler: Option<SamplerHandle>,
    queue: Option<PersistenceQueue>,
}

impl Inner {
    fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            state: self.state,
            current_record: self.record.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn active_record_mut(&mut self, local_id: Uuid) -> Option<&mut SessionRecord> {
        if self.state != SessionState::Active {
            return None;
        }
        self.record
            .as_mut()
            .filter(|record| record.local_id() == local_id)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    events: EventBus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Events are emitted while the state lock is held so subscribers see
    /// them in transition order.
    fn emit_state(&self, inner: &Inner) {
        self.events
            .emit(TrackerEvent::StateChanged(inner.snapshot()));
    }

    fn accept_sample(&self, local_id: Uuid, sample: LocationSample) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(record) = inner.active_record_mut(local_id) else {
            return;
        };
        if !record.push_sample(sample.clone()) {
            return;
        }
        let sample_count = record.samples().len();
        if let Some(queue) = &inner.queue {
            queue.append(sample.clone());
        }
        self.events.emit(TrackerEvent::SampleAccepted {
            sample,
            sample_count,
        });
    }

    fn sample_failed(&self, local_id: Uuid, err: LocationError) {
        let mut inner = self.lock();
        if inner.active_record_mut(local_id).is_none() {
            return;
        }
        let error = TrackingError::from(err);
        if error.is_transient() {
            warn!("Sample read failed, keeping schedule: {error}");
        } else {
            error!("Sample read failed: {error}");
        }
        inner.last_error = Some(error.clone());
        self.events.emit(TrackerEvent::Advisory { error });
    }
}

/// Ties one session's persistence queue back to the controller.
struct QueueLink {
    shared: Weak<Shared>,
    local_id: Uuid,
}

impl QueueListener for QueueLink {
    fn session_created(&self, session_id: &str) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        match inner.record.as_mut() {
            Some(record) if record.local_id() == self.local_id => {
                record.assign_id(session_id.to_string());
            }
            _ => return,
        }
        shared.events.emit(TrackerEvent::SessionPersisted {
            session_id: session_id.to_string(),
        });
    }

    fn persistence_failed(&self, error: TrackingError) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.lock();
        let current = inner
            .record
            .as_ref()
            .is_some_and(|record| record.local_id() == self.local_id);
        // Finalize usually lands after the result was acknowledged; the
        // failure is still published, but only the current session owns
        // `last_error`.
        if current {
            inner.last_error = Some(error.clone());
        } else {
            warn!("persistence failure for session {}: {error}", self.local_id);
        }
        shared.events.emit(TrackerEvent::Advisory { error });
    }
}

/// Owns at most one session at a time and drives it through
/// `Idle -> AcquiringFix -> Active -> Finalizing -> Completed`.
///
/// Clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
    provider: Arc<dyn LocationProvider>,
    store: Arc<dyn SessionStore>,
    settings: TrackerSettings,
    clock: Arc<dyn Clock>,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn SessionStore>,
        settings: TrackerSettings,
    ) -> Self {
        Self::with_clock(provider, store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn LocationProvider>,
        store: Arc<dyn SessionStore>,
        settings: TrackerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                events: EventBus::new(settings.event_capacity),
            }),
            provider,
            store,
            settings,
            clock,
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.shared.events.subscribe()
    }

    /// Acquires an initial fix and begins tracking `activity_type`.
    ///
    /// Rejected with `SessionAlreadyActive` while a session is in progress.
    /// A `Completed` or `Failed` result still waiting is acknowledged
    /// implicitly.
    pub async fn start(&self, activity_type: ActivityType) -> TrackingResult<SessionRecord> {
        let (attempt, previous_queue) = {
            let mut inner = self.shared.lock();
            if inner.state.is_busy() {
                return Err(TrackingError::SessionAlreadyActive);
            }
            inner.attempt += 1;
            inner.state = SessionState::AcquiringFix;
            inner.record = None;
            inner.last_error = None;
            self.shared.emit_state(&inner);
            (inner.attempt, inner.queue.take())
        };
        drop(previous_queue);

        info!("Acquiring initial fix for {activity_type}");
        let result = request_fix(self.provider.as_ref(), &self.settings.fix_options()).await;

        let mut inner = self.shared.lock();
        if inner.attempt != attempt || inner.state != SessionState::AcquiringFix {
            return Err(TrackingError::SessionAbandoned);
        }

        let fix = match result {
            Ok(fix) => fix,
            Err(err) => {
                warn!("Initial fix failed: {err}");
                let error = TrackingError::from(err);
                inner.state = SessionState::Failed(err);
                inner.last_error = Some(error.clone());
                self.shared.emit_state(&inner);
                return Err(error);
            }
        };

        let start_time = self.clock.now();
        let first_sample = LocationSample::from(fix);
        let record = SessionRecord::begin(activity_type, start_time, first_sample.clone());
        let local_id = record.local_id();

        let queue = PersistenceQueue::spawn(
            self.store.clone(),
            Arc::new(QueueLink {
                shared: Arc::downgrade(&self.shared),
                local_id,
            }),
        );
        queue.create(
            record.activity_type().clone(),
            record.is_movement_based(),
            start_time,
        );
        queue.append(first_sample.clone());

        let cadence = self.settings.cadence_for(record.activity_type());
        let sampler = LocationSampler::new(self.provider.clone(), self.settings.fix_options())
            .start(
                cadence,
                self.sample_callback(local_id),
                self.error_callback(local_id),
            );

        info!(
            "Tracking {} (session {local_id}) every {} ms",
            record.activity_type(),
            cadence.as_millis()
        );

        inner.record = Some(record.clone());
        inner.sampler = Some(sampler);
        inner.queue = Some(queue);
        inner.state = SessionState::Active;
        self.shared.emit_state(&inner);
        self.shared.events.emit(TrackerEvent::SampleAccepted {
            sample: first_sample,
            sample_count: 1,
        });

        Ok(record)
    }

    /// Stops sampling, computes duration and distance, and freezes the record.
    /// Fails with `NoActiveSession` unless the controller is `Active`.
    pub fn finish(&self) -> TrackingResult<SessionRecord> {
        let sampler = {
            let mut inner = self.shared.lock();
            if inner.state != SessionState::Active {
                return Err(TrackingError::NoActiveSession);
            }
            inner.state = SessionState::Finalizing;
            self.shared.emit_state(&inner);
            inner.sampler.take()
        };

        // Must run without the state lock: a callback may be waiting on it.
        if let Some(sampler) = &sampler {
            sampler.stop();
        }

        let mut guard = self.shared.lock();
        if guard.state != SessionState::Finalizing {
            return Err(TrackingError::SessionAbandoned);
        }
        let inner = &mut *guard;
        let Some(record) = inner.record.as_mut() else {
            inner.state = SessionState::Idle;
            self.shared.emit_state(inner);
            return Err(TrackingError::NoActiveSession);
        };

        let distance = if record.is_movement_based() {
            total_distance(record.samples())
        } else {
            0.0
        };
        record.complete(self.clock.now(), distance)?;

        if let (Some(queue), Some(summary)) = (&inner.queue, SessionSummary::from_record(record)) {
            queue.finalize(summary);
        }

        info!(
            "Finished {} after {}s, {:.1} m over {} samples ({} writes pending)",
            record.activity_type(),
            record.duration_seconds().unwrap_or_default(),
            record.total_distance_meters().unwrap_or_default(),
            record.samples().len(),
            inner.queue.as_ref().map_or(0, PersistenceQueue::backlog)
        );

        let completed = record.clone();
        inner.state = SessionState::Completed;
        self.shared.emit_state(inner);
        Ok(completed)
    }

    /// Discards whatever session is in progress and returns to `Idle`.
    ///
    /// Returns the discarded record, marked `Aborted`, or `None` when there
    /// was nothing to discard. Nothing further is sent to the store.
    pub fn abandon(&self) -> TrackingResult<Option<SessionRecord>> {
        let (sampler, record) = {
            let mut inner = self.shared.lock();
            match inner.state {
                SessionState::Idle => return Ok(None),
                SessionState::Completed | SessionState::Failed(_) => {
                    return Err(TrackingError::NoActiveSession)
                }
                SessionState::AcquiringFix | SessionState::Active | SessionState::Finalizing => {}
            }

            inner.attempt += 1;
            if let Some(queue) = inner.queue.take() {
                queue.cancel();
            }
            let mut record = inner.record.take();
            if let Some(record) = record.as_mut() {
                record.abort();
            }
            inner.state = SessionState::Idle;
            self.shared.emit_state(&inner);
            (inner.sampler.take(), record)
        };

        if let Some(sampler) = sampler {
            sampler.stop();
        }
        if let Some(record) = &record {
            info!("Abandoned session {}", record.local_id());
        }
        Ok(record)
    }

    /// Attaches a verification reference to the completed session.
    pub fn attach_verification(&self, photo_ref: impl Into<String>) -> TrackingResult<SessionRecord> {
        let photo_ref = photo_ref.into();
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        if inner.state != SessionState::Completed {
            return Err(TrackingError::NoCompletedSession);
        }
        let Some(record) = inner.record.as_mut() else {
            return Err(TrackingError::NoCompletedSession);
        };

        record.attach_verification(photo_ref.clone())?;
        if let Some(queue) = &inner.queue {
            queue.attach(photo_ref);
        }
        let updated = record.clone();
        self.shared.emit_state(inner);
        Ok(updated)
    }

    /// Consumes a `Completed` or `Failed` result and returns to `Idle`.
    /// Returns false if there was nothing to acknowledge.
    pub fn acknowledge(&self) -> bool {
        let queue = {
            let mut inner = self.shared.lock();
            if !inner.state.is_settled() {
                return false;
            }
            inner.state = SessionState::Idle;
            inner.record = None;
            self.shared.emit_state(&inner);
            inner.queue.take()
        };
        // Queued writes still drain after the queue handle is dropped.
        drop(queue);
        true
    }

    /// Waits until the store has seen every write queued for the current
    /// session so far. Returns immediately when nothing is queued.
    pub async fn flush(&self) {
        let pending = self.shared.lock().queue.as_ref().map(PersistenceQueue::flush);
        if let Some(pending) = pending {
            // An error means the queue was cancelled; nothing left to wait for.
            let _ = pending.await;
        }
    }

    fn sample_callback(&self, local_id: Uuid) -> SampleCallback {
        let shared = Arc::downgrade(&self.shared);
        Box::new(move |fix: Fix| {
            if let Some(shared) = shared.upgrade() {
                shared.accept_sample(local_id, LocationSample::from(fix));
            }
        })
    }

    fn error_callback(&self, local_id: Uuid) -> ErrorCallback {
        let shared = Arc::downgrade(&self.shared);
        Box::new(move |err: LocationError| {
            if let Some(shared) = shared.upgrade() {
                shared.sample_failed(local_id, err);
            }
        })
    }
}
