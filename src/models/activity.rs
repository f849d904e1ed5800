use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Kind of workout being tracked.
///
/// Unknown names parse into `Other` and are treated as stationary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Running,
    Cycling,
    Swimming,
    Walking,
    Hiking,
    Yoga,
    Weightlifting,
    Stretching,
    Meditation,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Swimming => "swimming",
            ActivityType::Walking => "walking",
            ActivityType::Hiking => "hiking",
            ActivityType::Yoga => "yoga",
            ActivityType::Weightlifting => "weightlifting",
            ActivityType::Stretching => "stretching",
            ActivityType::Meditation => "meditation",
            ActivityType::Other(name) => name,
        }
    }

    /// Whether distance traveled is meaningful for this activity.
    pub fn is_movement_based(&self) -> bool {
        matches!(
            self,
            ActivityType::Running
                | ActivityType::Cycling
                | ActivityType::Swimming
                | ActivityType::Walking
                | ActivityType::Hiking
        )
    }
}

impl FromStr for ActivityType {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let activity = match normalized.as_str() {
            "running" => ActivityType::Running,
            "cycling" => ActivityType::Cycling,
            "swimming" => ActivityType::Swimming,
            "walking" => ActivityType::Walking,
            "hiking" => ActivityType::Hiking,
            "yoga" => ActivityType::Yoga,
            "weightlifting" => ActivityType::Weightlifting,
            "stretching" => ActivityType::Stretching,
            "meditation" => ActivityType::Meditation,
            _ => ActivityType::Other(value.trim().to_string()),
        };
        Ok(activity)
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(activity) => activity,
            Err(never) => match never {},
        }
    }
}

impl From<ActivityType> for String {
    fn from(activity: ActivityType) -> Self {
        activity.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
