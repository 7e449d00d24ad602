use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{format_date, parse_date, to_i64, to_u32, to_u64},
    },
    usage::{UsageRecord, WeeklyUsage},
};

fn row_to_usage(row: &Row) -> Result<UsageRecord> {
    let date: String = row.get("date")?;
    let total_seconds_watched: i64 = row.get("total_seconds_watched")?;
    let times_expired: i64 = row.get("times_expired")?;
    let times_stopped_early: i64 = row.get("times_stopped_early")?;

    Ok(UsageRecord {
        date: parse_date(&date, "date")?,
        total_seconds_watched: to_u64(total_seconds_watched, "total_seconds_watched")?,
        times_expired: to_u32(times_expired, "times_expired")?,
        times_stopped_early: to_u32(times_stopped_early, "times_stopped_early")?,
    })
}

pub struct UsageRepository<'a> {
    conn: &'a Connection,
}

impl<'a> UsageRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Missing days come back as empty records.
    pub fn get(&self, date: NaiveDate) -> Result<UsageRecord> {
        let row = self
            .conn
            .query_row(
                "SELECT date, total_seconds_watched, times_expired, times_stopped_early
                 FROM daily_usage WHERE date = ?1",
                params![format_date(date)],
                |row| Ok(row_to_usage(row)),
            )
            .optional()?;

        match row {
            Some(record) => record,
            None => Ok(UsageRecord::empty(date)),
        }
    }

    pub fn put(&self, record: &UsageRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_usage (date, total_seconds_watched, times_expired, times_stopped_early, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(date) DO UPDATE SET
                 total_seconds_watched = excluded.total_seconds_watched,
                 times_expired = excluded.times_expired,
                 times_stopped_early = excluded.times_stopped_early,
                 updated_at = excluded.updated_at",
            params![
                format_date(record.date),
                to_i64(record.total_seconds_watched)?,
                record.times_expired,
                record.times_stopped_early,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// `days` records ending at `today`, newest first, gaps filled with empty
    /// records.
    pub fn window(&self, today: NaiveDate, days: u64) -> Result<Vec<UsageRecord>> {
        (0..days as i64)
            .map(|offset| self.get(today - Duration::days(offset)))
            .collect()
    }

    pub fn clear_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM daily_usage", [])?)
    }
}

impl Database {
    pub async fn get_usage(&self, date: NaiveDate) -> Result<UsageRecord> {
        self.execute(move |conn| UsageRepository::new(conn).get(date))
            .await
    }

    pub async fn get_weekly_usage(&self, today: NaiveDate) -> Result<WeeklyUsage> {
        let days = self
            .execute(move |conn| UsageRepository::new(conn).window(today, WeeklyUsage::DAYS))
            .await?;
        Ok(WeeklyUsage { days })
    }

    pub async fn clear_usage(&self) -> Result<usize> {
        self.execute(|conn| UsageRepository::new(conn).clear_all())
            .await
    }
}
