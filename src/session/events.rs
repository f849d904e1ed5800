use serde::Serialize;
use tokio::sync::broadcast;

use crate::{error::TrackingError, models::LocationSample};

use super::TrackerSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackerEvent {
    StateChanged(TrackerSnapshot),
    #[serde(rename_all = "camelCase")]
    SampleAccepted {
        sample: LocationSample,
        sample_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    SessionPersisted { session_id: String },
    Advisory { error: TrackingError },
}

#[derive(Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn emit(&self, event: TrackerEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.sender.subscribe()
    }
}
