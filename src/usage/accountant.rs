use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ledger::UsageLedger, models::WatchSession};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone)]
struct OpenSession {
    id: String,
    started_at: DateTime<Utc>,
}

/// Measures how long each `Running` episode lasted and credits it to the
/// ledger. At most one clock is open at a time.
pub struct SessionAccountant {
    ledger: UsageLedger,
    open: Option<OpenSession>,
}

impl SessionAccountant {
    pub fn new(ledger: UsageLedger) -> Self {
        Self { ledger, open: None }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Opens a session clock. Returns false if one is already running.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.open.is_some() {
            return false;
        }
        let id = Uuid::new_v4().to_string();
        log_debug!("Watch session {id} opened");
        self.open = Some(OpenSession {
            id,
            started_at: now,
        });
        true
    }

    /// Closes the open clock, if any, and records its whole seconds.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<WatchSession> {
        let open = self.open.take()?;
        let duration_secs = (now - open.started_at).num_seconds().max(0) as u64;
        let session = WatchSession {
            id: open.id,
            started_at: open.started_at,
            ended_at: now,
            duration_secs,
        };

        self.ledger.add_watch_time(duration_secs);
        self.ledger.record_session(&session);
        log_debug!("Watch session {} closed after {}s", session.id, duration_secs);
        Some(session)
    }
}
