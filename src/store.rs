//! Persistence boundary for timer state and usage counters.
//!
//! Each call must be atomic on its own; nothing here is transactional across
//! calls. `db::Database` is the durable implementation, [`MemoryStore`] keeps
//! everything in process.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::NaiveDate;

use crate::{
    error::{MonitorError, Result},
    timer::TimerState,
    usage::{UsageRecord, WatchSession},
};

pub trait StateStore: Send + Sync {
    fn load_timer(&self) -> Result<Option<TimerState>>;
    fn save_timer(&self, state: &TimerState) -> Result<()>;
    fn clear_timer(&self) -> Result<()>;

    /// Returns an empty record for dates never written.
    fn load_usage(&self, date: NaiveDate) -> Result<UsageRecord>;
    fn save_usage(&self, record: &UsageRecord) -> Result<()>;

    fn record_watch_session(&self, session: &WatchSession) -> Result<()>;

    /// Blocks until every earlier write has landed.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    timer: Option<TimerState>,
    usage: BTreeMap<NaiveDate, UsageRecord>,
    sessions: Vec<WatchSession>,
    timer_writes: usize,
    fail_writes: bool,
}

/// In-process store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that starts out holding `state`, as if written by a previous run.
    pub fn with_timer(state: TimerState) -> Self {
        let store = Self::default();
        store.lock().timer = Some(state);
        store
    }

    pub fn timer(&self) -> Option<TimerState> {
        self.lock().timer
    }

    pub fn usage(&self, date: NaiveDate) -> UsageRecord {
        self.lock()
            .usage
            .get(&date)
            .cloned()
            .unwrap_or_else(|| UsageRecord::empty(date))
    }

    pub fn sessions(&self) -> Vec<WatchSession> {
        self.lock().sessions.clone()
    }

    /// Number of `save_timer`/`clear_timer` calls that went through.
    pub fn timer_writes(&self) -> usize {
        self.lock().timer_writes
    }

    /// Makes every subsequent write fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn writable(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        let guard = self.lock();
        if guard.fail_writes {
            return Err(MonitorError::persistence("memory store is read-only"));
        }
        Ok(guard)
    }
}

impl StateStore for MemoryStore {
    fn load_timer(&self) -> Result<Option<TimerState>> {
        Ok(self.lock().timer)
    }

    fn save_timer(&self, state: &TimerState) -> Result<()> {
        let mut guard = self.writable()?;
        guard.timer = Some(*state);
        guard.timer_writes += 1;
        Ok(())
    }

    fn clear_timer(&self) -> Result<()> {
        let mut guard = self.writable()?;
        guard.timer = None;
        guard.timer_writes += 1;
        Ok(())
    }

    fn load_usage(&self, date: NaiveDate) -> Result<UsageRecord> {
        Ok(self.usage(date))
    }

    fn save_usage(&self, record: &UsageRecord) -> Result<()> {
        self.writable()?.usage.insert(record.date, record.clone());
        Ok(())
    }

    fn record_watch_session(&self, session: &WatchSession) -> Result<()> {
        self.writable()?.sessions.push(session.clone());
        Ok(())
    }
}
