use serde::Serialize;

use crate::{error::TrackingError, location::LocationError, models::SessionRecord};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    AcquiringFix,
    Active,
    Finalizing,
    Completed,
    Failed(LocationError),
}

impl SessionState {
    /// A session is in progress and a new `start` must be rejected.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::AcquiringFix | SessionState::Active | SessionState::Finalizing
        )
    }

    /// A result is waiting to be acknowledged.
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub state: SessionState,
    pub current_record: Option<SessionRecord>,
    pub last_error: Option<TrackingError>,
}
