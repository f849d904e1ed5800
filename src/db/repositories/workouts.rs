use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{optional_timestamp_column, sql_integer, timestamp_column, unsigned};
use crate::{
    db::{connection::Database, models::StoredWorkout},
    models::{ActivityType, SessionStatus},
    persistence::SessionSummary,
};

const WORKOUT_COLUMNS: &str = "id, activity_type, is_movement_based, status, start_time, end_time,
     duration_seconds, total_distance_meters, verification_photo, is_verified,
     created_at, updated_at";

fn status_column(row: &Row) -> Result<SessionStatus> {
    let raw: String = row.get("status")?;
    [
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Aborted,
    ]
    .into_iter()
    .find(|status| status.as_str() == raw)
    .ok_or_else(|| anyhow!("unknown workout status {raw:?}"))
}

fn row_to_workout(row: &Row) -> Result<StoredWorkout> {
    let activity_type: String = row.get("activity_type")?;
    let duration_seconds: Option<i64> = row.get("duration_seconds")?;

    Ok(StoredWorkout {
        id: row.get("id")?,
        activity_type: ActivityType::from(activity_type),
        is_movement_based: row.get("is_movement_based")?,
        status: status_column(row)?,
        start_time: timestamp_column(row, "start_time")?,
        end_time: optional_timestamp_column(row, "end_time")?,
        duration_seconds: duration_seconds
            .map(|value| unsigned(value, "duration_seconds"))
            .transpose()?,
        total_distance_meters: row.get("total_distance_meters")?,
        verification_photo: row.get("verification_photo")?,
        is_verified: row.get("is_verified")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

impl Database {
    /// Inserts an `Active` workout and returns its generated id.
    pub async fn insert_workout(
        &self,
        activity_type: &ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let activity_type = activity_type.as_str().to_string();
        let row_id = id.clone();
        self.execute(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO workouts (id, activity_type, is_movement_based, status, start_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    row_id,
                    activity_type,
                    is_movement_based,
                    SessionStatus::Active.as_str(),
                    start_time.to_rfc3339(),
                    now,
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    pub async fn finalize_workout(&self, workout_id: &str, summary: &SessionSummary) -> Result<()> {
        let workout_id = workout_id.to_string();
        let summary = summary.clone();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE workouts
                 SET status = ?1,
                     end_time = ?2,
                     duration_seconds = ?3,
                     total_distance_meters = ?4,
                     updated_at = ?5
                 WHERE id = ?6 AND status = ?7",
                params![
                    SessionStatus::Completed.as_str(),
                    summary.end_time.to_rfc3339(),
                    sql_integer(summary.duration_seconds)?,
                    summary.total_distance_meters,
                    Utc::now().to_rfc3339(),
                    workout_id,
                    SessionStatus::Active.as_str(),
                ],
            )?;
            if changed == 0 {
                bail!("workout {workout_id} is not active");
            }
            Ok(())
        })
        .await
    }

    /// Records the verification photo and marks the workout verified.
    pub async fn set_verification_photo(&self, workout_id: &str, photo_ref: &str) -> Result<()> {
        let workout_id = workout_id.to_string();
        let photo_ref = photo_ref.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE workouts
                 SET verification_photo = ?1,
                     is_verified = 1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    photo_ref,
                    Utc::now().to_rfc3339(),
                    workout_id,
                    SessionStatus::Completed.as_str(),
                ],
            )?;
            if changed == 0 {
                bail!("workout {workout_id} is not completed");
            }
            Ok(())
        })
        .await
    }

    pub async fn get_workout(&self, workout_id: &str) -> Result<Option<StoredWorkout>> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = ?1");
            let workout = conn
                .query_row(&sql, params![workout_id], |row| Ok(row_to_workout(row)))
                .optional()?
                .transpose()?;
            Ok(workout)
        })
        .await
    }

    /// Most recent first.
    pub async fn list_workouts(&self, limit: usize) -> Result<Vec<StoredWorkout>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY start_time DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![limit])?;

            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }
            Ok(workouts)
        })
        .await
    }

    /// Workouts still marked `Active`, oldest first.
    pub async fn get_incomplete_workouts(&self) -> Result<Vec<StoredWorkout>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE status = ?1 ORDER BY start_time ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![SessionStatus::Active.as_str()])?;

            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }
            Ok(workouts)
        })
        .await
    }

    pub async fn mark_workout_aborted(&self, workout_id: &str) -> Result<()> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE workouts
                 SET status = ?1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    SessionStatus::Aborted.as_str(),
                    Utc::now().to_rfc3339(),
                    workout_id,
                    SessionStatus::Active.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Deletes the workout and, through the foreign key, its points.
    pub async fn delete_workout(&self, workout_id: &str) -> Result<bool> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            let deleted = conn.execute("DELETE FROM workouts WHERE id = ?1", params![workout_id])?;
            Ok(deleted > 0)
        })
        .await
    }
}
