use std::{collections::VecDeque, fs, path::Path, sync::Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Fix, FixOptions, LocationError, LocationProvider};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedFix {
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

/// One step of a recorded track: a fix, or a read failure to replay as a gap.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReplayStep {
    Failure { error: LocationError },
    Fix(RecordedFix),
}

/// Serves a recorded list of fixes in order, then reports
/// `PositionUnavailable` forever. Fixes without a timestamp are stamped when
/// they are served.
pub struct ReplayProvider {
    steps: Mutex<VecDeque<ReplayStep>>,
}

impl ReplayProvider {
    pub fn from_fixes(fixes: Vec<Fix>) -> Self {
        let steps = fixes
            .into_iter()
            .map(|fix| {
                ReplayStep::Fix(RecordedFix {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    accuracy: fix.accuracy,
                    timestamp: Some(fix.timestamp),
                })
            })
            .collect();

        Self {
            steps: Mutex::new(steps),
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let steps: VecDeque<ReplayStep> =
            serde_json::from_str(contents).context("failed to parse recorded fixes")?;
        Ok(Self {
            steps: Mutex::new(steps),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixes from {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ReplayStep>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LocationProvider for ReplayProvider {
    async fn current_fix(&self, _options: &FixOptions) -> Result<Fix, LocationError> {
        match self.lock().pop_front() {
            Some(ReplayStep::Fix(recorded)) => Ok(Fix {
                latitude: recorded.latitude,
                longitude: recorded.longitude,
                accuracy: recorded.accuracy,
                timestamp: recorded.timestamp.unwrap_or_else(Utc::now),
            }),
            Some(ReplayStep::Failure { error }) => Err(error),
            None => Err(LocationError::PositionUnavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_fixes_and_gaps_in_order() {
        let provider = ReplayProvider::from_json(
            r#"[
                {"latitude": 55.0, "longitude": 12.0, "accuracy": 4.5},
                {"error": "timeout"},
                {"latitude": 55.001, "longitude": 12.0, "timestamp": "2024-05-01T10:00:00Z"}
            ]"#,
        )
        .unwrap();
        let options = FixOptions::default();

        let first = provider.current_fix(&options).await.unwrap();
        assert_eq!(first.latitude, 55.0);
        assert_eq!(first.accuracy, Some(4.5));

        assert_eq!(
            provider.current_fix(&options).await,
            Err(LocationError::Timeout)
        );

        let third = provider.current_fix(&options).await.unwrap();
        assert_eq!(third.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        assert!(provider.is_exhausted());
        assert_eq!(
            provider.current_fix(&options).await,
            Err(LocationError::PositionUnavailable)
        );
    }

    #[test]
    fn rejects_malformed_track() {
        assert!(ReplayProvider::from_json(r#"[{"lat": 1}]"#).is_err());
    }
}
