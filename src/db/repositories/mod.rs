mod location_points;
mod workouts;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;

/// Timestamps are stored as RFC 3339 text.
fn timestamp_column(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    decode_timestamp(&raw, column)
}

fn optional_timestamp_column(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| decode_timestamp(&raw, column)).transpose()
}

fn decode_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .with_context(|| format!("{column} holds an invalid timestamp {raw:?}"))
}

fn unsigned(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{column} is negative ({value})"))
}

fn sql_integer(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("{value} does not fit an SQLite INTEGER"))
}
