mod cli;
pub mod clock;
pub mod db;
pub mod distance;
pub mod error;
pub mod location;
pub mod models;
pub mod persistence;
pub mod sampling;
pub mod session;
pub mod settings;
pub mod stats;
mod utils;

pub use clock::{Clock, SystemClock};
pub use db::Database;
pub use distance::{haversine_distance, total_distance};
pub use error::{TrackingError, TrackingResult};
pub use location::{Fix, FixOptions, LocationError, LocationProvider, ReplayProvider};
pub use models::{ActivityType, LocationSample, SessionRecord, SessionStatus};
pub use persistence::{SessionStore, SessionSummary};
pub use sampling::{LocationSampler, SamplerHandle};
pub use session::{SessionController, SessionState, TrackerEvent, TrackerSnapshot};
pub use settings::{SettingsStore, TrackerSettings};
pub use stats::{format_distance, format_duration, WorkoutStats};

pub fn run() -> anyhow::Result<()> {
    let debug_mode = std::env::var("FITTRACK_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(if debug_mode {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    log::info!("FitTrack starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::dispatch(cli::parse()))
}
