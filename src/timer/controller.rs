use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, MutexGuard},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    bypass::BypassOutcome,
    context::SessionContext,
    monitor::{Collaborators, Monitor, MonitorSnapshot},
    sensing::{HostEvent, ModeEdge},
    usage::WeeklyUsage,
};

use super::{TickOutcome, TimerStatus, PERSIST_EVERY_TICKS};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

pub const DEBUG_ENV_VAR: &str = "MONSTER_TIMER_DEBUG";

struct TickDriver {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl TickDriver {
    fn is_alive(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.handle.is_finished()
    }

    fn stop(self) {
        self.cancel_token.cancel();
        self.handle.abort();
    }
}

struct Shared {
    monitor: Monitor,
    driver: Option<TickDriver>,
}

/// Async front of a [`Monitor`]: serializes host events, bypass attempts and
/// the once-per-second tick onto one lock, and owns the tick task.
#[derive(Clone)]
pub struct MonitorController {
    shared: Arc<Mutex<Shared>>,
    context: Arc<SessionContext>,
    tick_interval: Duration,
}

impl MonitorController {
    pub fn new(collaborators: Collaborators, context: Arc<SessionContext>) -> Self {
        let debug_mode = std::env::var(DEBUG_ENV_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let persist_every = if debug_mode { 1 } else { PERSIST_EVERY_TICKS };

        let monitor =
            Monitor::new(collaborators, context.clone()).with_persist_every(persist_every);
        Self::from_monitor(monitor, context)
    }

    pub fn from_monitor(monitor: Monitor, context: Arc<SessionContext>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                monitor,
                driver: None,
            })),
            context,
            tick_interval: Duration::from_secs(1),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Restores persisted state and marks the session as monitoring.
    pub async fn start(&self) -> TimerStatus {
        let mut guard = self.shared.lock().await;
        let status = guard.monitor.restore();
        self.context.set_monitoring(true);
        self.sync_driver(&mut guard);
        log_info!("Monitoring started in state {}", status.as_str());
        status
    }

    pub async fn handle_event(&self, event: &HostEvent) -> Option<ModeEdge> {
        let mut guard = self.shared.lock().await;
        let now = guard.monitor.now();
        let edge = guard.monitor.detect(event, now)?;

        // The tick task must be gone before the paused value is computed.
        if edge == ModeEdge::Exited {
            Self::stop_driver(&mut guard);
        }
        guard.monitor.apply_edge(edge, now);
        self.sync_driver(&mut guard);
        Some(edge)
    }

    pub async fn submit_bypass(&self, candidate: &str) -> BypassOutcome {
        let mut guard = self.shared.lock().await;
        let outcome = guard.monitor.submit_bypass(candidate);
        self.sync_driver(&mut guard);
        outcome
    }

    pub async fn acknowledge(&self) -> bool {
        let mut guard = self.shared.lock().await;
        let acknowledged = guard.monitor.acknowledge_intervention();
        self.sync_driver(&mut guard);
        acknowledged
    }

    pub async fn stop_early(&self) -> bool {
        let mut guard = self.shared.lock().await;
        let stopped = guard.monitor.stop_early();
        self.sync_driver(&mut guard);
        stopped
    }

    pub async fn rearm(&self) -> bool {
        self.shared.lock().await.monitor.rearm()
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.shared.lock().await.monitor.snapshot()
    }

    pub async fn weekly_usage(&self) -> WeeklyUsage {
        self.shared.lock().await.monitor.weekly_usage()
    }

    pub async fn shutdown(&self) {
        let mut guard = self.shared.lock().await;
        Self::stop_driver(&mut guard);
        guard.monitor.shutdown();
        self.context.set_monitoring(false);
    }

    /// Starts the tick task when the timer is running and none is alive, and
    /// stops it otherwise.
    fn sync_driver(&self, shared: &mut MutexGuard<'_, Shared>) {
        let running = shared.monitor.status() == TimerStatus::Running;
        let alive = shared.driver.as_ref().is_some_and(TickDriver::is_alive);

        if running && !alive {
            shared.driver = Some(self.spawn_driver());
        } else if !running {
            Self::stop_driver(shared);
        }
    }

    fn stop_driver(shared: &mut MutexGuard<'_, Shared>) {
        if let Some(driver) = shared.driver.take() {
            log_debug!("Stopping tick driver");
            driver.stop();
        }
    }

    fn spawn_driver(&self) -> TickDriver {
        let shared = self.shared.clone();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            // First tick one period after start, not immediately.
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let mut guard = shared.lock().await;
                        // Cancelled while waiting for the lock.
                        if token.is_cancelled() {
                            break;
                        }
                        match guard.monitor.tick() {
                            TickOutcome::Counting { .. } => {}
                            TickOutcome::Expired | TickOutcome::NotRunning => {
                                if let Some(driver) = guard.driver.take() {
                                    driver.cancel_token.cancel();
                                }
                                break;
                            }
                        }
                    }
                }
            }
            log_debug!("Tick driver exited");
        });

        log_debug!("Tick driver started");
        TickDriver {
            cancel_token,
            handle,
        }
    }
}
