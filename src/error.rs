//! Error taxonomy for the tracking core.
//!
//! Errors that prevent a session from starting are fatal and end up in the
//! controller's `Failed` state. Everything that happens while a session is
//! running (failed sample reads, persistence failures) is advisory: it is
//! published on the event channel and never moves the controller out of
//! `Active`.

use serde::Serialize;
use thiserror::Error;

use crate::location::LocationError;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum TrackingError {
    #[error("location permission was denied")]
    PermissionDenied,
    #[error("device position is unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a location fix")]
    Timeout,
    #[error("a session is already active")]
    SessionAlreadyActive,
    #[error("no active session")]
    NoActiveSession,
    #[error("no completed session to attach verification to")]
    NoCompletedSession,
    #[error("session was abandoned")]
    SessionAbandoned,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl TrackingError {
    /// Short, actionable text for a failed start.
    pub fn user_message(&self) -> &'static str {
        match self {
            TrackingError::PermissionDenied => {
                "Location access is turned off. Allow location access to track this workout."
            }
            TrackingError::PositionUnavailable => {
                "Your location could not be determined. Move somewhere with a clearer sky view and try again."
            }
            TrackingError::Timeout => {
                "Getting your location took too long. Try again in a moment."
            }
            TrackingError::SessionAlreadyActive => "A workout is already being tracked.",
            TrackingError::NoActiveSession => "There is no workout in progress.",
            TrackingError::NoCompletedSession => "Finish a workout before adding a photo.",
            TrackingError::SessionAbandoned => "The workout was discarded.",
            TrackingError::Persistence(_) => "The workout could not be saved.",
        }
    }

    /// Transient errors are recovered locally while sampling.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TrackingError::PositionUnavailable | TrackingError::Timeout
        )
    }

    pub(crate) fn persistence(err: &anyhow::Error) -> Self {
        TrackingError::Persistence(format!("{err:#}"))
    }
}

impl From<LocationError> for TrackingError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => TrackingError::PermissionDenied,
            LocationError::PositionUnavailable => TrackingError::PositionUnavailable,
            LocationError::Timeout => TrackingError::Timeout,
        }
    }
}

pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_errors_map_onto_taxonomy() {
        assert_eq!(
            TrackingError::from(LocationError::PermissionDenied),
            TrackingError::PermissionDenied
        );
        assert_eq!(
            TrackingError::from(LocationError::Timeout),
            TrackingError::Timeout
        );
        assert!(TrackingError::Timeout.is_transient());
        assert!(!TrackingError::PermissionDenied.is_transient());
    }

    #[test]
    fn persistence_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("failed to append sample");
        let mapped = TrackingError::persistence(&err);
        assert_eq!(
            mapped,
            TrackingError::Persistence("failed to append sample: disk full".into())
        );
    }
}
