use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Per-day usage counters. Append-only by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub total_seconds_watched: u64,
    pub times_expired: u32,
    pub times_stopped_early: u32,
}

impl UsageRecord {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_seconds_watched: 0,
            times_expired: 0,
            times_stopped_early: 0,
        }
    }

    pub fn formatted_watch_time(&self) -> String {
        format_duration_secs(self.total_seconds_watched)
    }
}

/// One closed watch session, kept as history next to the daily counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Trailing seven-day window, newest day first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyUsage {
    pub days: Vec<UsageRecord>,
}

impl WeeklyUsage {
    pub const DAYS: u64 = 7;

    pub fn today(&self) -> Option<&UsageRecord> {
        self.days.first()
    }

    pub fn total_seconds_watched(&self) -> u64 {
        self.days.iter().map(|day| day.total_seconds_watched).sum()
    }

    pub fn total_expired(&self) -> u32 {
        self.days.iter().map(|day| day.times_expired).sum()
    }

    pub fn total_stopped_early(&self) -> u32 {
        self.days.iter().map(|day| day.times_stopped_early).sum()
    }

    pub fn formatted_total(&self) -> String {
        format_duration_secs(self.total_seconds_watched())
    }
}

pub fn format_duration_secs(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
