use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::{store::StateStore, utils::Clock};

use super::models::{UsageRecord, WatchSession, WeeklyUsage};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Accumulation rules for the daily usage counters. Storage is delegated to
/// the [`StateStore`]; this type owns what gets added where.
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn add_watch_time(&self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        if let Some(record) = self.update(|record| {
            record.total_seconds_watched = record.total_seconds_watched.saturating_add(seconds)
        }) {
            log_info!(
                "Updated usage: {} watched on {}",
                record.formatted_watch_time(),
                record.date
            );
        }
    }

    pub fn record_expiry(&self) {
        self.update(|record| record.times_expired = record.times_expired.saturating_add(1));
    }

    pub fn record_stopped_early(&self) {
        self.update(|record| {
            record.times_stopped_early = record.times_stopped_early.saturating_add(1)
        });
    }

    pub fn record_session(&self, session: &WatchSession) {
        if let Err(err) = self.store.record_watch_session(session) {
            log_error!("Failed to record watch session {}: {err}", session.id);
        }
    }

    pub fn load(&self, date: NaiveDate) -> UsageRecord {
        match self.store.load_usage(date) {
            Ok(record) => record,
            Err(err) => {
                log_error!("Failed to load usage for {date}: {err}");
                UsageRecord::empty(date)
            }
        }
    }

    pub fn today(&self) -> UsageRecord {
        self.load(self.clock.today())
    }

    pub fn weekly(&self) -> WeeklyUsage {
        let today = self.clock.today();
        let days = (0..WeeklyUsage::DAYS as i64)
            .map(|offset| self.load(today - Duration::days(offset)))
            .collect();
        WeeklyUsage { days }
    }

    /// Read-modify-write on today's record. A failed read skips the write so a
    /// transient error cannot reset the day's counters.
    fn update(&self, apply: impl FnOnce(&mut UsageRecord)) -> Option<UsageRecord> {
        let date = self.clock.today();
        let mut record = match self.store.load_usage(date) {
            Ok(record) => record,
            Err(err) => {
                log_error!("Failed to load usage for {date}, skipping update: {err}");
                return None;
            }
        };
        apply(&mut record);
        if let Err(err) = self.store.save_usage(&record) {
            log_error!("Failed to save usage for {date}: {err}");
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::MemoryStore, utils::ManualClock};
    use chrono::{TimeZone, Utc};

    fn ledger() -> (UsageLedger, MemoryStore, Arc<ManualClock>) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let ledger = UsageLedger::new(Arc::new(store.clone()), clock.clone());
        (ledger, store, clock)
    }

    #[test]
    fn counters_accumulate_on_todays_record() {
        let (ledger, store, clock) = ledger();

        ledger.add_watch_time(90);
        ledger.add_watch_time(30);
        ledger.record_expiry();
        ledger.record_stopped_early();
        ledger.record_stopped_early();

        let record = store.usage(clock.today());
        assert_eq!(record.total_seconds_watched, 120);
        assert_eq!(record.times_expired, 1);
        assert_eq!(record.times_stopped_early, 2);
        assert_eq!(ledger.today(), record);
    }

    #[test]
    fn zero_second_sessions_write_nothing() {
        let (ledger, store, clock) = ledger();
        ledger.add_watch_time(0);
        assert_eq!(store.usage(clock.today()), UsageRecord::empty(clock.today()));
    }

    #[test]
    fn weekly_covers_today_and_six_previous_days() {
        let (ledger, _store, clock) = ledger();

        ledger.add_watch_time(600);
        clock.advance(Duration::days(3));
        ledger.add_watch_time(60);
        clock.advance(Duration::days(4));
        ledger.add_watch_time(30);

        let week = ledger.weekly();
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.days[0].date, clock.today());
        assert_eq!(week.days[6].date, clock.today() - Duration::days(6));
        // The first write is now eight days old and outside the window.
        assert_eq!(week.total_seconds_watched(), 90);
    }

    #[test]
    fn write_failures_are_swallowed() {
        let (ledger, store, clock) = ledger();
        store.set_fail_writes(true);
        ledger.record_expiry();
        store.set_fail_writes(false);
        assert_eq!(store.usage(clock.today()).times_expired, 0);
    }
}
