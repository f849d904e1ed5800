use std::sync::Arc;

use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::location::{request_fix, FixOptions, LocationProvider};

use super::controller::DeliveryGate;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Reads are awaited inline, so at most one request is ever outstanding.
/// Ticks that come due while a slow read is pending are skipped.
pub(crate) async fn sampling_loop(
    provider: Arc<dyn LocationProvider>,
    options: FixOptions,
    interval: Duration,
    gate: DeliveryGate,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reads: u64 = 0;
    let mut failures: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_debug!("dropping in-flight location read after stop");
                break;
            }
            result = request_fix(provider.as_ref(), &options) => result,
        };
        reads += 1;

        match &result {
            Ok(fix) => log_debug!(
                "sample {} at ({:.6}, {:.6}) in {}ms",
                reads,
                fix.latitude,
                fix.longitude,
                started.elapsed().as_millis()
            ),
            Err(err) => {
                failures += 1;
                log_debug!(
                    "location read {} failed after {}ms: {err}",
                    reads,
                    started.elapsed().as_millis()
                );
            }
        }

        if cancel_token.is_cancelled() || !gate.deliver(result) {
            break;
        }
    }

    log_info!(
        "sampling loop shutting down after {} reads ({} failed)",
        reads,
        failures
    );
}
