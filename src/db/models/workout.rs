use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ActivityType, LocationSample, SessionStatus};

/// A workout row as persisted, independent of any in-memory session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkout {
    pub id: String,
    pub activity_type: ActivityType,
    pub is_movement_based: bool,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    pub total_distance_meters: Option<f64>,
    pub verification_photo: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredPoint {
    pub id: i64,
    pub workout_id: String,
    /// Position in acceptance order, starting at 0.
    pub seq: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl From<StoredPoint> for LocationSample {
    fn from(point: StoredPoint) -> Self {
        LocationSample {
            latitude: point.latitude,
            longitude: point.longitude,
            accuracy: point.accuracy,
            recorded_at: point.recorded_at,
        }
    }
}
