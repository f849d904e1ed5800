use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::{
    models::{ActivityType, LocationSample},
    persistence::{SessionStore, SessionSummary},
};

use super::Database;

#[async_trait]
impl SessionStore for Database {
    async fn create_session(
        &self,
        activity_type: &ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    ) -> Result<String> {
        self.insert_workout(activity_type, is_movement_based, start_time)
            .await
            .context("failed to insert workout")
    }

    async fn append_sample(&self, session_id: &str, sample: &LocationSample) -> Result<()> {
        self.append_location_point(session_id, sample)
            .await
            .with_context(|| format!("failed to store location point for {session_id}"))
    }

    async fn finalize_session(&self, session_id: &str, summary: &SessionSummary) -> Result<()> {
        self.finalize_workout(session_id, summary)
            .await
            .with_context(|| format!("failed to finalize workout {session_id}"))
    }

    async fn attach_verification(&self, session_id: &str, photo_ref: &str) -> Result<()> {
        self.set_verification_photo(session_id, photo_ref)
            .await
            .with_context(|| format!("failed to attach verification to {session_id}"))
    }
}

impl Database {
    /// Marks workouts left `Active` by a crash or an abandoned session as
    /// `Aborted`. Returns how many were recovered.
    pub async fn recover_incomplete_workouts(&self) -> Result<usize> {
        let incomplete = self.get_incomplete_workouts().await?;
        let mut recovered = 0;

        for workout in incomplete {
            match self.mark_workout_aborted(&workout.id).await {
                Ok(()) => {
                    info!(
                        "Marked interrupted {} workout {} as aborted",
                        workout.activity_type, workout.id
                    );
                    recovered += 1;
                }
                Err(err) => warn!("Failed to recover workout {}: {err:#}", workout.id),
            }
        }

        Ok(recovered)
    }
}
