use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::location::{Fix, FixOptions, LocationError, LocationProvider};

use super::loop_worker::sampling_loop;

pub type SampleCallback = Box<dyn FnMut(Fix) + Send + 'static>;
pub type ErrorCallback = Box<dyn FnMut(LocationError) + Send + 'static>;

struct Delivery {
    open: bool,
    on_sample: SampleCallback,
    on_error: ErrorCallback,
}

/// Callbacks run while holding this lock, and closing takes the same lock.
/// Once `close` returns no callback is running and none will start.
#[derive(Clone)]
pub(crate) struct DeliveryGate {
    inner: Arc<Mutex<Delivery>>,
}

impl DeliveryGate {
    fn new(on_sample: SampleCallback, on_error: ErrorCallback) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Delivery {
                open: true,
                on_sample,
                on_error,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Delivery> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hands a read result to the matching callback. Returns false if the
    /// gate was closed and the result was discarded.
    pub(crate) fn deliver(&self, result: Result<Fix, LocationError>) -> bool {
        let mut delivery = self.lock();
        if !delivery.open {
            return false;
        }
        match result {
            Ok(fix) => (delivery.on_sample)(fix),
            Err(err) => (delivery.on_error)(err),
        }
        true
    }

    fn close(&self) -> bool {
        let mut delivery = self.lock();
        std::mem::replace(&mut delivery.open, false)
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

/// Issues one location read per tick against a provider.
#[derive(Clone)]
pub struct LocationSampler {
    provider: Arc<dyn LocationProvider>,
    options: FixOptions,
}

impl LocationSampler {
    pub fn new(provider: Arc<dyn LocationProvider>, options: FixOptions) -> Self {
        Self { provider, options }
    }

    /// Starts sampling every `interval`; the first read happens one interval
    /// from now. Must be called from within a tokio runtime.
    ///
    /// Callbacks must not call back into the returned handle.
    pub fn start(
        &self,
        interval: Duration,
        on_sample: SampleCallback,
        on_error: ErrorCallback,
    ) -> SamplerHandle {
        let interval = interval.max(Duration::from_millis(1));
        let cancel_token = CancellationToken::new();
        let gate = DeliveryGate::new(on_sample, on_error);

        let task = tokio::spawn(sampling_loop(
            self.provider.clone(),
            self.options,
            interval,
            gate.clone(),
            cancel_token.clone(),
        ));

        info!("Location sampler started ({} ms cadence)", interval.as_millis());

        SamplerHandle {
            cancel_token,
            gate,
            task: Some(task),
        }
    }
}

pub struct SamplerHandle {
    cancel_token: CancellationToken,
    gate: DeliveryGate,
    task: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    /// Stops the schedule. Idempotent; after the first call returns neither
    /// callback fires again, including for a read that was already in flight.
    pub fn stop(&self) {
        self.cancel_token.cancel();
        if self.gate.close() {
            info!("Location sampler stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.gate.is_open()
    }

    /// Stops the sampler and waits for its task to wind down.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::error!("sampling loop task failed to join: {err}");
            }
        }
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        // Must not take the gate lock: the last owner may be dropped from
        // inside a callback.
        self.cancel_token.cancel();
    }
}
