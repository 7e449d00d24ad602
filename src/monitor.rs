//! Synchronous supervisor tying detection, countdown, accounting and bypass
//! together. The async controller wraps one of these behind a lock; tests and
//! replays drive it directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    bypass::{BypassGate, BypassOutcome},
    context::SessionContext,
    hooks::{AlertSink, InterventionSink},
    sensing::{HostEvent, Indicators, ModeDetector, ModeEdge},
    settings::SettingsSource,
    store::StateStore,
    timer::{EngineSnapshot, EntryOutcome, TickOutcome, TimerEngine, TimerStatus},
    usage::{SessionAccountant, UsageLedger, UsageRecord, WeeklyUsage},
    utils::Clock,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Everything outside the core a monitor talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub settings: Arc<dyn SettingsSource>,
    pub intervention: Arc<dyn InterventionSink>,
    pub alerts: Arc<dyn AlertSink>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub status: TimerStatus,
    pub remaining_ms: u64,
    pub in_mode: bool,
    pub bypass_engaged: bool,
    /// Set while a controller is running this monitor.
    pub monitoring: bool,
    pub session_open: bool,
    pub today: UsageRecord,
}

pub struct Monitor {
    detector: ModeDetector,
    engine: TimerEngine,
    accountant: SessionAccountant,
    gate: BypassGate,
    ledger: UsageLedger,
    settings: Arc<dyn SettingsSource>,
    clock: Arc<dyn Clock>,
    context: Arc<SessionContext>,
}

impl Monitor {
    pub fn new(collaborators: Collaborators, context: Arc<SessionContext>) -> Self {
        let Collaborators {
            store,
            settings,
            intervention,
            alerts,
            clock,
        } = collaborators;

        let config = settings.load();
        let ledger = UsageLedger::new(store.clone(), clock.clone());
        let engine = TimerEngine::new(
            store,
            ledger.clone(),
            settings.clone(),
            intervention,
            alerts,
            context.clone(),
        );

        Self {
            detector: ModeDetector::new(Indicators::default(), config.monitored_package),
            engine,
            accountant: SessionAccountant::new(ledger.clone()),
            gate: BypassGate::new(),
            ledger,
            settings,
            clock,
            context,
        }
    }

    pub fn with_persist_every(mut self, ticks: u32) -> Self {
        self.engine = self.engine.with_persist_every(ticks);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn status(&self) -> TimerStatus {
        self.engine.status()
    }

    pub fn restore(&mut self) -> TimerStatus {
        let now = self.clock.now();
        self.engine.restore(now)
    }

    /// Classifies one host notification without acting on it.
    pub fn detect(&mut self, event: &HostEvent, now: DateTime<Utc>) -> Option<ModeEdge> {
        let config = self.settings.load();
        self.detector.set_monitored_package(config.monitored_package);
        if config.monitoring_enabled {
            self.detector.observe(event, now)
        } else {
            self.detector.force_exit()
        }
    }

    pub fn apply_edge(&mut self, edge: ModeEdge, now: DateTime<Utc>) -> Option<EntryOutcome> {
        match edge {
            ModeEdge::Entered => {
                let outcome = self.engine.enter_mode(now);
                log_debug!("Mode entered: {outcome:?}");
                if outcome.started_running() {
                    self.accountant.start(now);
                }
                Some(outcome)
            }
            ModeEdge::Exited => {
                self.engine.exit_mode(now);
                self.accountant.stop(now);
                None
            }
        }
    }

    /// Detects and applies in one step.
    pub fn handle_event(&mut self, event: &HostEvent) -> Option<ModeEdge> {
        let now = self.clock.now();
        let edge = self.detect(event, now)?;
        self.apply_edge(edge, now);
        Some(edge)
    }

    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        self.engine.tick(now)
    }

    pub fn submit_bypass(&mut self, candidate: &str) -> BypassOutcome {
        let configured = self.settings.load().bypass_credential;
        let result = self.gate.check(candidate, &configured);
        if result.is_ok() {
            let now = self.clock.now();
            self.engine.cancel_for_bypass(now);
            self.accountant.stop(now);
        }
        BypassGate::outcome_of(&result)
    }

    pub fn acknowledge_intervention(&mut self) -> bool {
        let now = self.clock.now();
        self.engine.acknowledge(now)
    }

    pub fn stop_early(&mut self) -> bool {
        let now = self.clock.now();
        let stopped = self.engine.stop_early(now);
        if stopped {
            self.accountant.stop(now);
        }
        stopped
    }

    /// Drops a pending bypass without waiting for the next entry to absorb it.
    pub fn rearm(&mut self) -> bool {
        let was_engaged = self.context.take_bypass();
        if was_engaged {
            log_info!("Bypass withdrawn; next entry starts a session");
        }
        was_engaged
    }

    pub fn engine_snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot(self.clock.now())
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let engine = self.engine_snapshot();
        MonitorSnapshot {
            status: engine.status,
            remaining_ms: engine.remaining_ms,
            in_mode: self.detector.in_mode(),
            bypass_engaged: self.context.is_bypassed(),
            monitoring: self.context.is_monitoring(),
            session_open: self.accountant.is_open(),
            today: self.ledger.today(),
        }
    }

    pub fn weekly_usage(&self) -> WeeklyUsage {
        self.ledger.weekly()
    }

    /// Closes the watch clock and writes the live countdown before exit.
    pub fn shutdown(&mut self) {
        let now = self.clock.now();
        self.accountant.stop(now);
        self.engine.shutdown(now);
        log_info!("Monitor shut down in state {}", self.engine.status().as_str());
    }
}
