use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_i64, to_u64},
    },
    timer::TimerState,
};

fn row_to_timer_state(row: &Row) -> Result<TimerState> {
    let remaining_ms: i64 = row.get("remaining_ms")?;
    let last_updated_at: String = row.get("last_updated_at")?;
    let is_active: bool = row.get("is_active")?;

    Ok(TimerState {
        remaining_ms: to_u64(remaining_ms, "remaining_ms")?,
        last_updated_at: parse_datetime(&last_updated_at, "last_updated_at")?,
        is_active,
    })
}

/// The countdown lives in a single row with `id = 1`.
pub struct TimerStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> TimerStateRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self) -> Result<Option<TimerState>> {
        let row = self
            .conn
            .query_row(
                "SELECT remaining_ms, last_updated_at, is_active FROM timer_state WHERE id = 1",
                [],
                |row| Ok(row_to_timer_state(row)),
            )
            .optional()?;
        row.transpose()
    }

    pub fn put(&self, state: &TimerState) -> Result<()> {
        self.conn.execute(
            "INSERT INTO timer_state (id, remaining_ms, last_updated_at, is_active)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 remaining_ms = excluded.remaining_ms,
                 last_updated_at = excluded.last_updated_at,
                 is_active = excluded.is_active",
            params![
                to_i64(state.remaining_ms)?,
                state.last_updated_at.to_rfc3339(),
                state.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM timer_state", [])?;
        Ok(())
    }
}

impl Database {
    pub async fn get_timer_state(&self) -> Result<Option<TimerState>> {
        self.execute(|conn| TimerStateRepository::new(conn).get())
            .await
    }

    pub async fn clear_timer_state(&self) -> Result<()> {
        self.execute(|conn| TimerStateRepository::new(conn).clear())
            .await
    }
}
