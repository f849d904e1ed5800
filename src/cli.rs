use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::{
    db::Database,
    location::ReplayProvider,
    models::{ActivityType, SessionRecord},
    session::{SessionController, TrackerEvent},
    settings::{SettingsStore, TrackerSettings},
    stats::{format_distance, format_duration, WorkoutStats},
};

#[derive(Parser)]
#[command(name = "fittrack")]
#[command(about = "Track workouts from recorded location fixes", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full session against a JSON file of recorded fixes
    Replay {
        /// Activity name, e.g. running, cycling, yoga
        #[arg(long)]
        activity: String,
        /// JSON array of fixes served in order
        #[arg(long)]
        fixes: PathBuf,
        #[arg(long, default_value = "fittrack.sqlite3")]
        db: PathBuf,
        /// Settings JSON; missing fields use defaults
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Overrides both sampling cadences
        #[arg(long)]
        cadence_ms: Option<u64>,
        /// Verification reference to attach after finishing
        #[arg(long)]
        photo: Option<String>,
    },
    /// List stored workouts, most recent first
    List {
        #[arg(long, default_value = "fittrack.sqlite3")]
        db: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub(crate) fn parse() -> Cli {
    Cli::parse()
}

pub(crate) async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Replay {
            activity,
            fixes,
            db,
            settings,
            cadence_ms,
            photo,
        } => {
            let mut settings = match settings {
                Some(path) => SettingsStore::new(path)?.get(),
                None => TrackerSettings::default(),
            };
            if let Some(cadence_ms) = cadence_ms {
                settings.movement_cadence_ms = cadence_ms;
                settings.stationary_cadence_ms = cadence_ms;
            }
            let activity = ActivityType::from(activity);
            replay(activity, fixes, open_database(db).await?, settings, photo).await
        }
        Commands::List { db, limit } => list(open_database(db).await?, limit).await,
    }
}

async fn open_database(path: PathBuf) -> Result<Database> {
    let database = Database::new(path)?;
    let recovered = database.recover_incomplete_workouts().await?;
    if recovered > 0 {
        warn!("Recovered {recovered} interrupted workout(s)");
    }
    Ok(database)
}

async fn replay(
    activity: ActivityType,
    fixes: PathBuf,
    database: Database,
    settings: TrackerSettings,
    photo: Option<String>,
) -> Result<()> {
    let provider = Arc::new(ReplayProvider::load(&fixes)?);
    info!(
        "Replaying {} recorded steps from {}",
        provider.remaining(),
        fixes.display()
    );

    let controller = SessionController::new(provider.clone(), Arc::new(database), settings);
    let mut events = controller.subscribe();

    controller
        .start(activity)
        .await
        .map_err(|err| anyhow::anyhow!("{}", err.user_message()))
        .context("could not start workout")?;

    loop {
        match events.recv().await {
            Ok(TrackerEvent::SampleAccepted { sample_count, .. }) => {
                info!("{sample_count} samples recorded");
                if provider.is_exhausted() {
                    break;
                }
            }
            Ok(TrackerEvent::Advisory { error }) => {
                warn!("{error}");
                if provider.is_exhausted() {
                    break;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Event stream lagged by {skipped}"),
            Err(RecvError::Closed) => bail!("controller shut down unexpectedly"),
        }
    }

    let mut record = controller.finish()?;
    if let Some(photo) = photo {
        record = controller.attach_verification(photo)?;
    }
    controller.flush().await;

    let snapshot = controller.snapshot();
    if let Some(error) = snapshot.last_error {
        warn!("Last reported problem: {error}");
    }
    if let Some(stored) = snapshot.current_record.as_ref().and_then(SessionRecord::id) {
        println!("Saved workout {stored}");
    }
    print_record(&record);
    controller.acknowledge();
    Ok(())
}

fn print_record(record: &SessionRecord) {
    println!("Activity:  {}", record.activity_type());
    println!("Duration:  {}", format_duration(record.duration_seconds()));
    if record.is_movement_based() {
        println!(
            "Distance:  {}",
            format_distance(record.total_distance_meters())
        );
    }
    println!("Samples:   {}", record.samples().len());
    if let Some(photo) = record.verification_photo_ref() {
        println!("Verified:  {photo}");
    }
}

async fn list(database: Database, limit: usize) -> Result<()> {
    let workouts = database.list_workouts(limit).await?;
    if workouts.is_empty() {
        println!("No workouts recorded yet in {}", database.path().display());
        return Ok(());
    }

    for workout in &workouts {
        let points = database.get_location_points(&workout.id).await?;
        println!(
            "{}  {:<13} {:<9} {:>8} {:>9} {:>4} pts{}",
            workout.start_time.format("%Y-%m-%d %H:%M"),
            workout.activity_type.as_str(),
            workout.status.as_str(),
            format_duration(workout.duration_seconds),
            format_distance(workout.total_distance_meters),
            points.len(),
            if workout.is_verified { "  verified" } else { "" }
        );
    }

    let stats = WorkoutStats::from_workouts(&workouts);
    println!();
    println!(
        "{} workouts, {} total, {} covered across {} movement workouts",
        stats.total_workouts,
        format_duration(Some(stats.total_duration_seconds)),
        format_distance(Some(stats.total_distance_meters)),
        stats.movement_workouts
    );
    if let Some(favourite) = stats.most_frequent_activity {
        println!("Most frequent: {favourite}");
    }
    Ok(())
}
