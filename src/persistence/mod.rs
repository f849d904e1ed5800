//! Seam to the durable store for sessions and their samples.

mod queue;

pub(crate) use queue::{PersistenceQueue, QueueListener};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ActivityType, LocationSample, SessionRecord};

/// Values written when a session is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub total_distance_meters: f64,
}

impl SessionSummary {
    /// `None` until the record has been completed.
    pub fn from_record(record: &SessionRecord) -> Option<Self> {
        Some(Self {
            end_time: record.end_time()?,
            duration_seconds: record.duration_seconds()?,
            total_distance_meters: record.total_distance_meters()?,
        })
    }
}

/// Every call may fail independently. Calls for one session arrive in
/// order, one at a time.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the id the store assigned to the new session.
    async fn create_session(
        &self,
        activity_type: &ActivityType,
        is_movement_based: bool,
        start_time: DateTime<Utc>,
    ) -> Result<String>;

    async fn append_sample(&self, session_id: &str, sample: &LocationSample) -> Result<()>;

    async fn finalize_session(&self, session_id: &str, summary: &SessionSummary) -> Result<()>;

    async fn attach_verification(&self, session_id: &str, photo_ref: &str) -> Result<()>;
}
