#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fittrack_lib::{
    ActivityType, Clock, Fix, FixOptions, LocationError, LocationProvider, LocationSample,
    SessionController, SessionStore, SessionSummary, TrackerEvent, TrackerSettings,
};
use tokio::{
    sync::{broadcast, Notify},
    time::Instant,
};

pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap()
}

pub fn fix(latitude: f64, longitude: f64) -> Fix {
    Fix::new(latitude, longitude, origin()).with_accuracy(5.0)
}

pub enum Step {
    Reply(Result<Fix, LocationError>),
    /// Resolves only after the notify fires.
    Gated(Arc<Notify>, Fix),
    Delayed(Duration, Result<Fix, LocationError>),
    /// Never resolves.
    Hang,
}

/// Plays back a fixed script of replies; `PositionUnavailable` once empty.
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_options: Mutex<Option<FixOptions>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    pub fn fixes(fixes: Vec<Fix>) -> Arc<Self> {
        Self::new(fixes.into_iter().map(|fix| Step::Reply(Ok(fix))).collect())
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<FixOptions> {
        *self.last_options.lock().unwrap()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationProvider for ScriptedProvider {
    async fn current_fix(&self, options: &FixOptions) -> Result<Fix, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(*options);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Gated(notify, fix)) => {
                notify.notified().await;
                Ok(fix)
            }
            Some(Step::Delayed(delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            Some(Step::Hang) => std::future::pending().await,
            None => Err(LocationError::PositionUnavailable),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create {
        activity_type: ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    },
    Append {
        session_id: String,
        sample: LocationSample,
    },
    Finalize {
        session_id: String,
        summary: SessionSummary,
    },
    Attach {
        session_id: String,
        photo_ref: String,
    },
}

/// In-memory store that records every call in arrival order.
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<StoreCall>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    fail_append: AtomicBool,
    fail_finalize: AtomicBool,
    append_delay_ms: AtomicU64,
    appends_in_flight: AtomicUsize,
    max_appends_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn appended(&self) -> Vec<LocationSample> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Append { sample, .. } => Some(sample),
                _ => None,
            })
            .collect()
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn fail_finalize(&self, fail: bool) {
        self.fail_finalize.store(fail, Ordering::SeqCst);
    }

    pub fn delay_appends(&self, delay: Duration) {
        self.append_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn max_appends_in_flight(&self) -> usize {
        self.max_appends_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create_session(
        &self,
        activity_type: &ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    ) -> Result<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("store offline");
        }
        self.record(StoreCall::Create {
            activity_type: activity_type.clone(),
            is_movement_based,
            start_time,
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("w-{id}"))
    }

    async fn append_sample(&self, session_id: &str, sample: &LocationSample) -> Result<()> {
        let now = self.appends_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_appends_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self.append_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.appends_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_append.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.record(StoreCall::Append {
            session_id: session_id.to_string(),
            sample: sample.clone(),
        });
        Ok(())
    }

    async fn finalize_session(&self, session_id: &str, summary: &SessionSummary) -> Result<()> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        self.record(StoreCall::Finalize {
            session_id: session_id.to_string(),
            summary: summary.clone(),
        });
        Ok(())
    }

    async fn attach_verification(&self, session_id: &str, photo_ref: &str) -> Result<()> {
        self.record(StoreCall::Attach {
            session_id: session_id.to_string(),
            photo_ref: photo_ref.to_string(),
        });
        Ok(())
    }
}

/// Wall clock driven by tokio's (pausable) clock.
pub struct TestClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl TestClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: origin(),
            started: Instant::now(),
        })
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

pub fn settings(movement_cadence_ms: u64, stationary_cadence_ms: u64) -> TrackerSettings {
    TrackerSettings {
        movement_cadence_ms,
        stationary_cadence_ms,
        ..TrackerSettings::default()
    }
}

pub fn controller(
    provider: Arc<ScriptedProvider>,
    store: Arc<RecordingStore>,
    settings: TrackerSettings,
) -> SessionController {
    SessionController::with_clock(provider, store, settings, TestClock::new())
}

pub fn drain(events: &mut broadcast::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Lets spawned tasks run without moving the paused clock forward.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
