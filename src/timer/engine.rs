//! Countdown state machine.
//!
//! ```text
//! Idle ──entry──▶ Running ──exit──▶ Paused ──entry──▶ Running
//!                    │                                   │
//!                    └──────────── tick hits 0 ──────────┴──▶ Expired
//! Expired ──acknowledge / bypass──▶ Idle
//! ```
//!
//! The engine has no thread of its own. Every call takes `now` from the caller
//! and is expected to run to completion before the next one starts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    context::SessionContext,
    hooks::{AlertSink, InterventionSink},
    settings::{SettingsSource, DEFAULT_SESSION_BUDGET_MS},
    store::StateStore,
    usage::UsageLedger,
};

use super::state::{TimerState, TimerStatus, WarningFlags};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Ticks between persisted snapshots while running.
pub const PERSIST_EVERY_TICKS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Fresh session from the configured budget.
    Started { remaining_ms: u64 },
    /// Picked up where the previous session left off.
    Resumed { remaining_ms: u64 },
    /// The budget is spent; the intervention was (re)activated.
    Expired,
    /// Absorbed by a pending bypass.
    Suppressed,
    AlreadyRunning,
}

impl EntryOutcome {
    pub fn started_running(&self) -> bool {
        matches!(
            self,
            EntryOutcome::Started { .. } | EntryOutcome::Resumed { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NotRunning,
    Counting { remaining_ms: u64 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub status: TimerStatus,
    pub remaining_ms: u64,
}

pub struct TimerEngine {
    status: TimerStatus,
    remaining_ms: u64,
    last_tick_at: Option<DateTime<Utc>>,
    ticks_since_persist: u32,
    persist_every_ticks: u32,
    warnings: WarningFlags,
    /// What we last asked the store to hold. Used instead of re-reading so a
    /// failed write does not lose track of the countdown.
    persisted: Option<TimerState>,
    store: Arc<dyn StateStore>,
    ledger: UsageLedger,
    settings: Arc<dyn SettingsSource>,
    intervention: Arc<dyn InterventionSink>,
    alerts: Arc<dyn AlertSink>,
    context: Arc<SessionContext>,
}

impl TimerEngine {
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: UsageLedger,
        settings: Arc<dyn SettingsSource>,
        intervention: Arc<dyn InterventionSink>,
        alerts: Arc<dyn AlertSink>,
        context: Arc<SessionContext>,
    ) -> Self {
        Self {
            status: TimerStatus::Idle,
            remaining_ms: 0,
            last_tick_at: None,
            ticks_since_persist: 0,
            persist_every_ticks: PERSIST_EVERY_TICKS,
            warnings: WarningFlags::default(),
            persisted: None,
            store,
            ledger,
            settings,
            intervention,
            alerts,
            context,
        }
    }

    pub fn with_persist_every(mut self, ticks: u32) -> Self {
        self.persist_every_ticks = ticks.max(1);
        self
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn persisted(&self) -> Option<TimerState> {
        self.persisted
    }

    /// Remaining time as of `now`, including the part of the current second
    /// the tick driver has not accounted for yet.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.last_tick_at) {
            (TimerStatus::Running, Some(last)) => {
                let elapsed = (now - last).num_milliseconds().max(0) as u64;
                self.remaining_ms.saturating_sub(elapsed)
            }
            _ => self.remaining_ms,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            status: self.status,
            remaining_ms: self.remaining_at(now),
        }
    }

    /// Rebuilds in-memory state from the store after a (re)start.
    pub fn restore(&mut self, now: DateTime<Utc>) -> TimerStatus {
        let loaded = match self.store.load_timer() {
            Ok(state) => state,
            Err(err) => {
                log_error!("Failed to load timer state, starting idle: {err}");
                None
            }
        };
        self.persisted = loaded;

        let Some(state) = loaded else {
            self.status = TimerStatus::Idle;
            return self.status;
        };

        let adjusted = state.adjusted_remaining_ms(now);
        if state.is_active && adjusted == 0 {
            log_info!("Timer expired while the monitor was not running");
            self.expire_from_record(state, now);
        } else {
            self.status = TimerStatus::Paused;
            self.remaining_ms = adjusted;
            if state.is_active {
                // Stop eroding from here on; the next entry edge resumes it.
                self.persist(TimerState::paused(adjusted, now));
            }
            log_info!("Restored timer state: {}s remaining", adjusted / 1000);
        }
        self.status
    }

    /// Mode-entry edge.
    pub fn enter_mode(&mut self, now: DateTime<Utc>) -> EntryOutcome {
        if self.context.take_bypass() {
            log_info!("Bypass consumed by mode entry; not starting a session");
            return EntryOutcome::Suppressed;
        }

        match self.status {
            TimerStatus::Running => EntryOutcome::AlreadyRunning,
            TimerStatus::Expired => {
                log_info!("Mode entered with the budget spent; showing intervention");
                self.activate_intervention();
                EntryOutcome::Expired
            }
            TimerStatus::Idle | TimerStatus::Paused => match self.persisted {
                Some(state) => {
                    let adjusted = state.adjusted_remaining_ms(now);
                    if adjusted == 0 {
                        self.expire_from_record(state, now);
                        return EntryOutcome::Expired;
                    }
                    self.start_running(adjusted, now);
                    log_info!("Resuming timer with {}s remaining", adjusted / 1000);
                    EntryOutcome::Resumed {
                        remaining_ms: adjusted,
                    }
                }
                None => {
                    let budget = self.session_budget_ms();
                    self.start_running(budget, now);
                    log_info!("Starting timer with {}s budget", budget / 1000);
                    EntryOutcome::Started {
                        remaining_ms: budget,
                    }
                }
            },
        }
    }

    /// Mode-exit edge. The caller must have stopped the tick driver already.
    /// Returns true when a running countdown was paused.
    pub fn exit_mode(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            TimerStatus::Running => {
                let remaining = self.remaining_at(now);
                self.status = TimerStatus::Paused;
                self.remaining_ms = remaining;
                self.last_tick_at = None;
                self.persist(TimerState::paused(remaining, now));
                log_info!("Timer paused with {}s remaining", remaining / 1000);
                true
            }
            TimerStatus::Expired => {
                self.dismiss_intervention();
                false
            }
            TimerStatus::Idle | TimerStatus::Paused => false,
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::NotRunning;
        }

        let remaining = self.remaining_at(now);
        self.remaining_ms = remaining;
        self.last_tick_at = Some(now);

        if remaining == 0 {
            self.expire(now);
            return TickOutcome::Expired;
        }

        if let Err(err) = self.alerts.emit_status(remaining) {
            log_warn!("Status update failed: {err}");
        }
        if let Some(warning) = self.warnings.evaluate(remaining) {
            log_info!("{:?} warning at {}ms", warning, remaining);
            if let Err(err) = self.alerts.emit_warning(warning.message()) {
                log_warn!("Warning delivery failed: {err}");
            }
        }

        self.ticks_since_persist += 1;
        if self.ticks_since_persist >= self.persist_every_ticks {
            self.ticks_since_persist = 0;
            self.persist(TimerState::running(remaining, now));
        }

        TickOutcome::Counting {
            remaining_ms: remaining,
        }
    }

    /// Authenticated bypass. Returns true if a running countdown was cut short.
    pub fn cancel_for_bypass(&mut self, _now: DateTime<Utc>) -> bool {
        let was_running = self.status == TimerStatus::Running;
        self.reset_to_idle();
        if was_running {
            self.ledger.record_stopped_early();
        }
        self.context.engage_bypass();
        self.dismiss_intervention();
        log_info!("Bypass granted; timer cleared");
        was_running
    }

    /// Intervention acknowledged: the spent budget is cleared so the next
    /// entry starts a fresh session.
    pub fn acknowledge(&mut self, _now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Expired {
            return false;
        }
        self.reset_to_idle();
        self.dismiss_intervention();
        log_info!("Intervention acknowledged; timer cleared");
        true
    }

    /// Viewer walked away before the budget ran out.
    pub fn stop_early(&mut self, _now: DateTime<Utc>) -> bool {
        if !matches!(self.status, TimerStatus::Running | TimerStatus::Paused) {
            return false;
        }
        self.reset_to_idle();
        self.ledger.record_stopped_early();
        log_info!("Session stopped early");
        true
    }

    /// Process teardown: write the live countdown and drain the store.
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        if self.status == TimerStatus::Running {
            let remaining = self.remaining_at(now);
            self.persist(TimerState::running(remaining, now));
        }
        if let Err(err) = self.store.flush() {
            log_error!("Failed to flush timer state on shutdown: {err}");
        }
    }

    fn session_budget_ms(&self) -> u64 {
        let config = self.settings.load();
        match config.validate() {
            Ok(()) => config.session_budget_ms,
            Err(err) => {
                log_warn!("{err}; using the default budget");
                DEFAULT_SESSION_BUDGET_MS
            }
        }
    }

    fn start_running(&mut self, remaining_ms: u64, now: DateTime<Utc>) {
        self.status = TimerStatus::Running;
        self.remaining_ms = remaining_ms;
        self.last_tick_at = Some(now);
        self.ticks_since_persist = 0;
        self.warnings.reset();
        self.persist(TimerState::running(remaining_ms, now));
        if let Err(err) = self.alerts.emit_status(remaining_ms) {
            log_warn!("Status update failed: {err}");
        }
    }

    fn expire(&mut self, now: DateTime<Utc>) {
        log_info!("Timer expired");
        self.status = TimerStatus::Expired;
        self.remaining_ms = 0;
        self.last_tick_at = None;
        self.persist(TimerState::expired(now));
        self.ledger.record_expiry();
        self.activate_intervention();
    }

    /// Expiry discovered from a stored record rather than observed by a tick.
    /// Only counted if the record is not already the expiry marker.
    fn expire_from_record(&mut self, state: TimerState, now: DateTime<Utc>) {
        if state.is_expiry_marker() {
            self.status = TimerStatus::Expired;
            self.remaining_ms = 0;
            self.last_tick_at = None;
            self.activate_intervention();
        } else {
            self.expire(now);
        }
    }

    fn reset_to_idle(&mut self) {
        self.status = TimerStatus::Idle;
        self.remaining_ms = 0;
        self.last_tick_at = None;
        self.ticks_since_persist = 0;
        self.persisted = None;
        if let Err(err) = self.store.clear_timer() {
            log_error!("Failed to clear timer state: {err}");
        }
    }

    fn persist(&mut self, state: TimerState) {
        self.persisted = Some(state);
        if let Err(err) = self.store.save_timer(&state) {
            log_error!("Failed to persist timer state: {err}");
        }
    }

    fn activate_intervention(&self) {
        if let Err(err) = self.intervention.activate_intervention() {
            log_error!("Failed to show intervention: {err}");
        }
    }

    fn dismiss_intervention(&self) {
        if let Err(err) = self.intervention.dismiss_intervention() {
            log_error!("Failed to dismiss intervention: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::Config,
        store::MemoryStore,
        testing::{Recorder, Signal},
        utils::{Clock, ManualClock},
    };
    use chrono::{Duration, TimeZone};

    const BUDGET: u64 = 600_000;

    struct Harness {
        engine: TimerEngine,
        store: MemoryStore,
        clock: Arc<ManualClock>,
        recorder: Arc<Recorder>,
        context: Arc<SessionContext>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(MemoryStore::new())
        }

        fn with_store(store: MemoryStore) -> Self {
            let clock = Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 3, 10, 16, 0, 0).unwrap(),
            ));
            let recorder = Arc::new(Recorder::default());
            let context = Arc::new(SessionContext::new());
            let ledger = UsageLedger::new(Arc::new(store.clone()), clock.clone());
            let config = Config {
                session_budget_ms: BUDGET,
                ..Config::default()
            };
            let engine = TimerEngine::new(
                Arc::new(store.clone()),
                ledger,
                Arc::new(config),
                recorder.clone(),
                recorder.clone(),
                context.clone(),
            );
            Self {
                engine,
                store,
                clock,
                recorder,
                context,
            }
        }

        fn now(&self) -> DateTime<Utc> {
            self.clock.now()
        }

        fn run_secs(&mut self, secs: u32) -> Vec<TickOutcome> {
            (0..secs)
                .map(|_| {
                    self.clock.advance_secs(1);
                    self.engine.tick(self.clock.now())
                })
                .collect()
        }
    }

    #[test]
    fn entry_from_idle_starts_full_budget_and_persists() {
        let mut h = Harness::new();
        let outcome = h.engine.enter_mode(h.now());

        assert_eq!(outcome, EntryOutcome::Started { remaining_ms: BUDGET });
        assert_eq!(h.engine.status(), TimerStatus::Running);
        assert_eq!(h.store.timer(), Some(TimerState::running(BUDGET, h.now())));
    }

    #[test]
    fn ticks_count_down_and_persist_every_ten() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        let writes_at_start = h.store.timer_writes();

        h.run_secs(9);
        assert_eq!(h.store.timer_writes(), writes_at_start);
        h.run_secs(1);
        assert_eq!(h.store.timer_writes(), writes_at_start + 1);
        assert_eq!(
            h.store.timer(),
            Some(TimerState::running(BUDGET - 10_000, h.now()))
        );
    }

    #[test]
    fn exit_pauses_with_partial_second_accounted() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(3);
        h.clock.advance_ms(400);

        assert!(h.engine.exit_mode(h.now()));
        assert_eq!(h.engine.status(), TimerStatus::Paused);
        assert_eq!(
            h.store.timer(),
            Some(TimerState::paused(BUDGET - 3_400, h.now()))
        );
    }

    #[test]
    fn pause_twice_matches_pause_once() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(5);

        h.engine.exit_mode(h.now());
        let once = h.store.timer();
        let writes = h.store.timer_writes();

        h.clock.advance_secs(30);
        assert!(!h.engine.exit_mode(h.now()));
        assert_eq!(h.store.timer(), once);
        assert_eq!(h.store.timer_writes(), writes);
    }

    #[test]
    fn paused_time_does_not_count() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(20);
        h.engine.exit_mode(h.now());

        h.clock.advance_secs(3_600);
        let outcome = h.engine.enter_mode(h.now());
        assert_eq!(
            outcome,
            EntryOutcome::Resumed {
                remaining_ms: BUDGET - 20_000
            }
        );
    }

    #[test]
    fn ticks_are_ignored_unless_running() {
        let mut h = Harness::new();
        assert_eq!(h.engine.tick(h.now()), TickOutcome::NotRunning);
        h.engine.enter_mode(h.now());
        h.engine.exit_mode(h.now());
        assert_eq!(h.run_secs(3), vec![TickOutcome::NotRunning; 3]);
    }

    #[test]
    fn countdown_warns_twice_and_expires_once() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        let outcomes = h.run_secs(605);

        let expiries = outcomes
            .iter()
            .filter(|o| **o == TickOutcome::Expired)
            .count();
        assert_eq!(expiries, 1);
        assert_eq!(outcomes[599], TickOutcome::Expired);

        assert_eq!(
            h.recorder.warnings(),
            vec![
                "2 minutes left!".to_string(),
                "1 minute left! The monster is coming!".to_string()
            ]
        );
        assert_eq!(h.recorder.count(Signal::Activate), 1);
        assert_eq!(h.engine.status(), TimerStatus::Expired);
        assert_eq!(
            h.store.timer(),
            Some(TimerState::expired(h.now() - Duration::seconds(5)))
        );
        assert_eq!(h.store.usage(h.clock.today()).times_expired, 1);
    }

    #[test]
    fn reentry_while_expired_reactivates_without_new_session() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(600);
        h.engine.exit_mode(h.now());
        assert_eq!(h.recorder.count(Signal::Dismiss), 1);

        assert_eq!(h.engine.enter_mode(h.now()), EntryOutcome::Expired);
        assert_eq!(h.recorder.count(Signal::Activate), 2);
        assert_eq!(h.store.usage(h.clock.today()).times_expired, 1);
    }

    #[test]
    fn acknowledge_clears_and_next_entry_is_fresh() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(600);

        assert!(h.engine.acknowledge(h.now()));
        assert_eq!(h.engine.status(), TimerStatus::Idle);
        assert_eq!(h.store.timer(), None);
        assert_eq!(
            h.engine.enter_mode(h.now()),
            EntryOutcome::Started { remaining_ms: BUDGET }
        );
    }

    #[test]
    fn restore_with_time_left_pauses_at_adjusted_value() {
        let store = MemoryStore::new();
        let mut h = Harness::with_store(store);
        let written = h.now() - Duration::seconds(30);
        h.store.save_timer(&TimerState::running(100_000, written)).unwrap();

        assert_eq!(h.engine.restore(h.now()), TimerStatus::Paused);
        assert_eq!(h.store.timer(), Some(TimerState::paused(70_000, h.now())));
        assert_eq!(h.recorder.count(Signal::Activate), 0);
    }

    #[test]
    fn restore_of_spent_budget_expires_and_counts_once() {
        let mut h = Harness::new();
        let written = h.now() - Duration::seconds(60);
        h.store.save_timer(&TimerState::running(5_000, written)).unwrap();

        assert_eq!(h.engine.restore(h.now()), TimerStatus::Expired);
        assert_eq!(h.recorder.count(Signal::Activate), 1);
        assert_eq!(h.store.usage(h.clock.today()).times_expired, 1);
        assert_eq!(h.store.timer(), Some(TimerState::expired(h.now())));
    }

    #[test]
    fn restore_of_expiry_marker_does_not_recount() {
        let mut h = Harness::new();
        h.store.save_timer(&TimerState::expired(h.now())).unwrap();

        assert_eq!(h.engine.restore(h.now()), TimerStatus::Expired);
        assert_eq!(h.store.usage(h.clock.today()).times_expired, 0);
    }

    #[test]
    fn bypass_while_running_counts_early_stop_and_absorbs_next_entry() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(30);

        assert!(h.engine.cancel_for_bypass(h.now()));
        assert_eq!(h.engine.status(), TimerStatus::Idle);
        assert_eq!(h.store.timer(), None);
        assert!(h.context.is_bypassed());
        assert_eq!(h.recorder.count(Signal::Dismiss), 1);
        assert_eq!(h.store.usage(h.clock.today()).times_stopped_early, 1);
        assert_eq!(h.engine.tick(h.now()), TickOutcome::NotRunning);

        assert_eq!(h.engine.enter_mode(h.now()), EntryOutcome::Suppressed);
        assert!(!h.context.is_bypassed());
        assert_eq!(
            h.engine.enter_mode(h.now()),
            EntryOutcome::Started { remaining_ms: BUDGET }
        );
    }

    #[test]
    fn bypass_while_expired_does_not_count_early_stop() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(600);

        assert!(!h.engine.cancel_for_bypass(h.now()));
        assert_eq!(h.store.usage(h.clock.today()).times_stopped_early, 0);
        assert_eq!(h.store.timer(), None);
    }

    #[test]
    fn stop_early_clears_without_bypass() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(10);
        h.engine.exit_mode(h.now());

        assert!(h.engine.stop_early(h.now()));
        assert!(!h.context.is_bypassed());
        assert_eq!(h.store.usage(h.clock.today()).times_stopped_early, 1);
        assert!(!h.engine.stop_early(h.now()));
    }

    #[test]
    fn persistence_failure_keeps_in_memory_countdown() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(10);
        h.store.set_fail_writes(true);
        h.run_secs(10);
        h.engine.exit_mode(h.now());

        assert_eq!(
            h.engine.persisted(),
            Some(TimerState::paused(BUDGET - 20_000, h.now()))
        );
        assert_eq!(
            h.engine.enter_mode(h.now()),
            EntryOutcome::Resumed {
                remaining_ms: BUDGET - 20_000
            }
        );
    }

    #[test]
    fn render_failure_does_not_block_expiry_bookkeeping() {
        let mut h = Harness::new();
        h.recorder.fail_intervention(true);
        h.engine.enter_mode(h.now());
        h.run_secs(600);

        assert_eq!(h.engine.status(), TimerStatus::Expired);
        assert_eq!(h.store.usage(h.clock.today()).times_expired, 1);
    }

    #[test]
    fn shutdown_persists_live_remaining() {
        let mut h = Harness::new();
        h.engine.enter_mode(h.now());
        h.run_secs(4);
        h.clock.advance_ms(700);
        h.engine.shutdown(h.now());

        assert_eq!(
            h.store.timer(),
            Some(TimerState::running(BUDGET - 4_700, h.now()))
        );
    }
}
