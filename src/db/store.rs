//! [`StateStore`] on top of the SQLite worker.
//!
//! Reads wait for the worker. Writes are queued in order and return as soon as
//! they are handed off; [`StateStore::flush`] waits for them to land.

use chrono::NaiveDate;

use crate::{
    error::Result,
    store::StateStore,
    timer::TimerState,
    usage::{UsageRecord, WatchSession},
};

use super::{
    connection::Database,
    repositories::{TimerStateRepository, UsageRepository, WatchSessionRepository},
};

impl StateStore for Database {
    fn load_timer(&self) -> Result<Option<TimerState>> {
        Ok(self.execute_blocking(|conn| TimerStateRepository::new(conn).get())?)
    }

    fn save_timer(&self, state: &TimerState) -> Result<()> {
        let state = *state;
        Ok(self.enqueue("save timer state", move |conn| {
            TimerStateRepository::new(conn).put(&state)
        })?)
    }

    fn clear_timer(&self) -> Result<()> {
        Ok(self.enqueue("clear timer state", |conn| {
            TimerStateRepository::new(conn).clear()
        })?)
    }

    fn load_usage(&self, date: NaiveDate) -> Result<UsageRecord> {
        Ok(self.execute_blocking(move |conn| UsageRepository::new(conn).get(date))?)
    }

    fn save_usage(&self, record: &UsageRecord) -> Result<()> {
        let record = record.clone();
        Ok(self.enqueue("save daily usage", move |conn| {
            UsageRepository::new(conn).put(&record)
        })?)
    }

    fn record_watch_session(&self, session: &WatchSession) -> Result<()> {
        let session = session.clone();
        Ok(self.enqueue("record watch session", move |conn| {
            WatchSessionRepository::new(conn).insert(&session)
        })?)
    }

    fn flush(&self) -> Result<()> {
        Ok(self.flush_blocking()?)
    }
}
