//! Human-readable formatting and aggregate totals over finished workouts.

use serde::Serialize;

use crate::{
    db::StoredWorkout,
    models::{ActivityType, SessionRecord},
};

/// `"N/A"` for a missing or zero duration.
pub fn format_duration(seconds: Option<u64>) -> String {
    let seconds = match seconds {
        Some(seconds) if seconds > 0 => seconds,
        _ => return "N/A".to_string(),
    };

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let remaining = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {remaining}s")
    }
}

/// `"N/A"` for a missing or zero distance.
pub fn format_distance(meters: Option<f64>) -> String {
    let meters = match meters {
        Some(meters) if meters > 0.0 && meters.is_finite() => meters,
        _ => return "N/A".to_string(),
    };

    if meters < 1000.0 {
        format!("{}m", meters.round() as u64)
    } else {
        format!("{:.2}km", meters / 1000.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStats {
    pub total_workouts: usize,
    pub total_duration_seconds: u64,
    /// Summed over movement-based workouts only.
    pub total_distance_meters: f64,
    pub movement_workouts: usize,
    pub most_frequent_activity: Option<ActivityType>,
}

impl WorkoutStats {
    pub fn from_records(records: &[SessionRecord]) -> Self {
        Self::accumulate(records.iter().map(|record| {
            (
                record.activity_type(),
                record.is_movement_based(),
                record.duration_seconds(),
                record.total_distance_meters(),
            )
        }))
    }

    pub fn from_workouts(workouts: &[StoredWorkout]) -> Self {
        Self::accumulate(workouts.iter().map(|workout| {
            (
                &workout.activity_type,
                workout.is_movement_based,
                workout.duration_seconds,
                workout.total_distance_meters,
            )
        }))
    }

    fn accumulate<'a, I>(entries: I) -> Self
    where
        I: Iterator<Item = (&'a ActivityType, bool, Option<u64>, Option<f64>)>,
    {
        let mut stats = Self::default();
        // Kept in first-seen order so ties go to the earliest activity.
        let mut counts: Vec<(&ActivityType, usize)> = Vec::new();

        for (activity, is_movement_based, duration, distance) in entries {
            stats.total_workouts += 1;
            stats.total_duration_seconds += duration.unwrap_or(0);
            if is_movement_based {
                stats.movement_workouts += 1;
                stats.total_distance_meters += distance.unwrap_or(0.0);
            }

            match counts.iter_mut().find(|(seen, _)| *seen == activity) {
                Some((_, count)) => *count += 1,
                None => counts.push((activity, 1)),
            }
        }

        let mut best: Option<(&ActivityType, usize)> = None;
        for (activity, count) in counts {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((activity, count));
            }
        }
        stats.most_frequent_activity = best.map(|(activity, _)| activity.clone());
        stats
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::models::LocationSample;

    fn finished(activity: ActivityType, seconds: i64, meters: f64) -> SessionRecord {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        let mut record =
            SessionRecord::begin(activity, start, LocationSample::new(48.85, 2.35, start));
        record
            .complete(start + Duration::seconds(seconds), meters)
            .unwrap();
        record
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(0)), "N/A");
        assert_eq!(format_duration(Some(59)), "0m 59s");
        assert_eq!(format_duration(Some(754)), "12m 34s");
        assert_eq!(format_duration(Some(3600)), "1h 0m");
        assert_eq!(format_duration(Some(5_430)), "1h 30m");
    }

    #[test]
    fn formats_distances() {
        assert_eq!(format_distance(None), "N/A");
        assert_eq!(format_distance(Some(0.0)), "N/A");
        assert_eq!(format_distance(Some(412.4)), "412m");
        assert_eq!(format_distance(Some(999.4)), "999m");
        assert_eq!(format_distance(Some(1000.0)), "1.00km");
        assert_eq!(format_distance(Some(5_236.0)), "5.24km");
    }

    #[test]
    fn distance_counts_movement_workouts_only() {
        let records = vec![
            finished(ActivityType::Running, 1_800, 5_000.0),
            finished(ActivityType::Yoga, 3_600, 0.0),
            finished(ActivityType::Cycling, 2_400, 12_000.0),
        ];
        let stats = WorkoutStats::from_records(&records);

        assert_eq!(stats.total_workouts, 3);
        assert_eq!(stats.total_duration_seconds, 7_800);
        assert_eq!(stats.movement_workouts, 2);
        assert!((stats.total_distance_meters - 17_000.0).abs() < 1e-9);
    }

    #[test]
    fn first_seen_activity_wins_ties() {
        let records = vec![
            finished(ActivityType::Yoga, 60, 0.0),
            finished(ActivityType::Running, 60, 100.0),
            finished(ActivityType::Running, 60, 100.0),
            finished(ActivityType::Yoga, 60, 0.0),
        ];
        let stats = WorkoutStats::from_records(&records);
        assert_eq!(stats.most_frequent_activity, Some(ActivityType::Yoga));
    }

    #[test]
    fn empty_input_has_no_favourite() {
        let stats = WorkoutStats::from_records(&[]);
        assert_eq!(stats, WorkoutStats::default());
        assert_eq!(stats.most_frequent_activity, None);
    }
}
