//! Geolocation provider seam.

mod replay;

pub use replay::ReplayProvider;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single reported device location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout")]
    Timeout,
}

/// Options passed with every fix request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached reading the provider may return. Zero means always fresh.
    pub max_age: Duration,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            max_age: Duration::ZERO,
        }
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    async fn current_fix(&self, options: &FixOptions) -> Result<Fix, LocationError>;
}

/// Requests one fix, enforcing `options.timeout` on our side so a provider
/// that never answers still resolves.
pub async fn request_fix(
    provider: &dyn LocationProvider,
    options: &FixOptions,
) -> Result<Fix, LocationError> {
    match tokio::time::timeout(options.timeout, provider.current_fix(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverAnswers;

    #[async_trait]
    impl LocationProvider for NeverAnswers {
        async fn current_fix(&self, _options: &FixOptions) -> Result<Fix, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_fix_times_out_on_silent_provider() {
        let options = FixOptions::default();
        let started = tokio::time::Instant::now();
        let result = request_fix(&NeverAnswers, &options).await;
        assert_eq!(result, Err(LocationError::Timeout));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }
}
