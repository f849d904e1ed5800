use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TrackingError, TrackingResult};

use super::{ActivityType, LocationSample};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Completed => "Completed",
            SessionStatus::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// One tracked activity and its samples.
///
/// Samples can only be appended while the record is `Active`; completing or
/// aborting freezes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    id: Option<String>,
    local_id: Uuid,
    activity_type: ActivityType,
    is_movement_based: bool,
    status: SessionStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration_seconds: Option<u64>,
    total_distance_meters: Option<f64>,
    samples: Vec<LocationSample>,
    verification_photo_ref: Option<String>,
}

impl SessionRecord {
    pub fn begin(
        activity_type: ActivityType,
        start_time: DateTime<Utc>,
        first_sample: LocationSample,
    ) -> Self {
        Self {
            id: None,
            local_id: Uuid::new_v4(),
            is_movement_based: activity_type.is_movement_based(),
            activity_type,
            status: SessionStatus::Active,
            start_time,
            end_time: None,
            duration_seconds: None,
            total_distance_meters: None,
            samples: vec![first_sample],
            verification_photo_ref: None,
        }
    }

    /// Id assigned by the store; `None` while the record is purely local.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn local_id(&self) -> Uuid {
        self.local_id
    }

    pub fn activity_type(&self) -> &ActivityType {
        &self.activity_type
    }

    pub fn is_movement_based(&self) -> bool {
        self.is_movement_based
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn duration_seconds(&self) -> Option<u64> {
        self.duration_seconds
    }

    pub fn total_distance_meters(&self) -> Option<f64> {
        self.total_distance_meters
    }

    pub fn samples(&self) -> &[LocationSample] {
        &self.samples
    }

    pub fn verification_photo_ref(&self) -> Option<&str> {
        self.verification_photo_ref.as_deref()
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        if self.id.is_none() {
            self.id = Some(id);
        }
    }

    /// Appends a sample in acceptance order. Returns false once frozen.
    pub(crate) fn push_sample(&mut self, sample: LocationSample) -> bool {
        if self.status != SessionStatus::Active {
            return false;
        }
        self.samples.push(sample);
        true
    }

    /// Active -> Completed. `distance_meters` is ignored for stationary
    /// activities, which always record exactly zero.
    pub(crate) fn complete(
        &mut self,
        end_time: DateTime<Utc>,
        distance_meters: f64,
    ) -> TrackingResult<()> {
        if self.status != SessionStatus::Active {
            return Err(TrackingError::NoActiveSession);
        }

        let end_time = end_time.max(self.start_time);
        let duration = (end_time - self.start_time).num_seconds().max(0) as u64;

        self.end_time = Some(end_time);
        self.duration_seconds = Some(duration);
        self.total_distance_meters = Some(if self.is_movement_based {
            distance_meters.max(0.0)
        } else {
            0.0
        });
        self.status = SessionStatus::Completed;
        Ok(())
    }

    pub(crate) fn abort(&mut self) {
        if self.status == SessionStatus::Active {
            self.status = SessionStatus::Aborted;
        }
    }

    pub(crate) fn attach_verification(&mut self, photo_ref: String) -> TrackingResult<()> {
        if self.status != SessionStatus::Completed {
            return Err(TrackingError::NoCompletedSession);
        }
        self.verification_photo_ref = Some(photo_ref);
        Ok(())
    }
}
