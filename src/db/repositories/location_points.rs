use anyhow::Result;
use rusqlite::{params, Row};

use super::{timestamp_column, unsigned};
use crate::{
    db::{connection::Database, models::StoredPoint},
    models::LocationSample,
};

fn row_to_point(row: &Row) -> Result<StoredPoint> {
    let seq: i64 = row.get("seq")?;

    Ok(StoredPoint {
        id: row.get("id")?,
        workout_id: row.get("workout_id")?,
        seq: unsigned(seq, "seq")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        accuracy: row.get("accuracy")?,
        recorded_at: timestamp_column(row, "recorded_at")?,
    })
}

impl Database {
    /// Appends after the workout's last stored point.
    pub async fn append_location_point(
        &self,
        workout_id: &str,
        sample: &LocationSample,
    ) -> Result<()> {
        let workout_id = workout_id.to_string();
        let sample = sample.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO location_points (workout_id, seq, latitude, longitude, accuracy, recorded_at)
                 VALUES (
                    ?1,
                    (SELECT COALESCE(MAX(seq) + 1, 0) FROM location_points WHERE workout_id = ?1),
                    ?2, ?3, ?4, ?5
                 )",
                params![
                    workout_id,
                    sample.latitude,
                    sample.longitude,
                    sample.accuracy,
                    sample.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Points in the order they were accepted.
    pub async fn get_location_points(&self, workout_id: &str) -> Result<Vec<StoredPoint>> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, workout_id, seq, latitude, longitude, accuracy, recorded_at
                 FROM location_points
                 WHERE workout_id = ?1
                 ORDER BY seq ASC",
            )?;
            let mut rows = stmt.query(params![workout_id])?;

            let mut points = Vec::new();
            while let Some(row) = rows.next()? {
                points.push(row_to_point(row)?);
            }
            Ok(points)
        })
        .await
    }
}
