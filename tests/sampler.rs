mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{fix, settle, ScriptedProvider, Step};
use fittrack_lib::{Fix, FixOptions, LocationError, LocationSampler};
use tokio::{sync::Notify, time::sleep};

#[derive(Default)]
struct Received {
    samples: Mutex<Vec<Fix>>,
    errors: Mutex<Vec<LocationError>>,
}

impl Received {
    fn samples(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    fn errors(&self) -> Vec<LocationError> {
        self.errors.lock().unwrap().clone()
    }
}

fn start(
    provider: Arc<ScriptedProvider>,
    interval: Duration,
) -> (fittrack_lib::SamplerHandle, Arc<Received>) {
    let received = Arc::new(Received::default());
    let on_sample = {
        let received = received.clone();
        Box::new(move |fix: Fix| received.samples.lock().unwrap().push(fix))
    };
    let on_error = {
        let received = received.clone();
        Box::new(move |err: LocationError| received.errors.lock().unwrap().push(err))
    };
    let handle = LocationSampler::new(provider, FixOptions::default()).start(interval, on_sample, on_error);
    (handle, received)
}

#[tokio::test(start_paused = true)]
async fn first_read_waits_one_interval() {
    let provider = ScriptedProvider::fixes(vec![fix(0.0, 0.0), fix(0.0, 0.001)]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(3));

    sleep(Duration::from_millis(2_900)).await;
    assert_eq!(provider.calls(), 0);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(received.samples(), 1);

    sleep(Duration::from_secs(3)).await;
    assert_eq!(received.samples(), 2);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let provider = ScriptedProvider::fixes(vec![fix(0.0, 0.0); 10]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(1));

    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(received.samples(), 2);

    handle.stop();
    let after_first = received.samples();
    handle.stop();
    assert!(handle.is_stopped());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(received.samples(), after_first);
    assert_eq!(provider.calls(), 2);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn in_flight_result_after_stop_is_discarded() {
    let gate = Arc::new(Notify::new());
    let provider = ScriptedProvider::new(vec![Step::Gated(gate.clone(), fix(1.0, 1.0))]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(1));

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(provider.calls(), 1);

    handle.stop();
    gate.notify_one();
    settle().await;
    sleep(Duration::from_secs(3)).await;

    assert_eq!(received.samples(), 0);
    assert!(received.errors().is_empty());
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn slow_reads_never_overlap() {
    let provider = ScriptedProvider::new(vec![
        Step::Delayed(Duration::from_millis(2_500), Ok(fix(0.0, 0.0))),
        Step::Delayed(Duration::from_millis(2_500), Ok(fix(0.0, 0.001))),
        Step::Reply(Ok(fix(0.0, 0.002))),
    ]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(1));

    sleep(Duration::from_millis(6_500)).await;
    handle.stop();

    assert_eq!(provider.max_in_flight(), 1);
    assert_eq!(received.samples(), 3);
    // Reads start at 1s, 3.5s and 6s; ticks missed in between are skipped.
    assert_eq!(provider.calls(), 3);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn errors_keep_the_schedule() {
    let provider = ScriptedProvider::new(vec![
        Step::Reply(Err(LocationError::PositionUnavailable)),
        Step::Reply(Err(LocationError::Timeout)),
        Step::Reply(Ok(fix(2.0, 2.0))),
    ]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(1));

    sleep(Duration::from_millis(3_500)).await;

    assert_eq!(
        received.errors(),
        vec![LocationError::PositionUnavailable, LocationError::Timeout]
    );
    assert_eq!(received.samples(), 1);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn hung_read_times_out_and_sampling_continues() {
    let provider = ScriptedProvider::new(vec![Step::Hang, Step::Reply(Ok(fix(3.0, 3.0)))]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(3));

    sleep(Duration::from_millis(12_500)).await;
    assert!(received.errors().is_empty());

    // Read issued at 3s times out at 13s; the overdue tick fires right away.
    sleep(Duration::from_secs(1)).await;
    assert_eq!(received.errors(), vec![LocationError::Timeout]);
    assert_eq!(received.samples(), 1);
    assert_eq!(provider.calls(), 2);
    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_sampling() {
    let provider = ScriptedProvider::fixes(vec![fix(0.0, 0.0); 5]);
    let (handle, received) = start(provider.clone(), Duration::from_secs(1));

    sleep(Duration::from_millis(1_500)).await;
    drop(handle);
    sleep(Duration::from_secs(5)).await;

    assert_eq!(received.samples(), 1);
    assert_eq!(provider.calls(), 1);
}
