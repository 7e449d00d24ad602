use anyhow::Result;
use rusqlite::{params, Connection, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_datetime, to_i64, to_u64},
    },
    usage::WatchSession,
};

fn row_to_watch_session(row: &Row) -> Result<WatchSession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;
    let duration_secs: i64 = row.get("duration_secs")?;

    Ok(WatchSession {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        duration_secs: to_u64(duration_secs, "duration_secs")?,
    })
}

pub struct WatchSessionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> WatchSessionRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, session: &WatchSession) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO watch_sessions (id, started_at, ended_at, duration_secs)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.started_at.to_rfc3339(),
                session.ended_at.to_rfc3339(),
                to_i64(session.duration_secs)?,
            ],
        )?;
        Ok(())
    }

    pub fn recent(&self, limit: u32) -> Result<Vec<WatchSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, ended_at, duration_secs
             FROM watch_sessions
             ORDER BY started_at DESC
             LIMIT ?1",
        )?;

        let mut rows = stmt.query(params![limit])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(row_to_watch_session(row)?);
        }
        Ok(sessions)
    }

    pub fn clear_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM watch_sessions", [])?)
    }
}

impl Database {
    pub async fn list_recent_watch_sessions(&self, limit: u32) -> Result<Vec<WatchSession>> {
        self.execute(move |conn| WatchSessionRepository::new(conn).recent(limit))
            .await
    }

    pub async fn clear_watch_sessions(&self) -> Result<usize> {
        self.execute(|conn| WatchSessionRepository::new(conn).clear_all())
            .await
    }
}
