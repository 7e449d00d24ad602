use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::MonitorError;

use super::classifier::{classify, Indicators};
use super::snapshot::{HostEvent, UiSnapshot};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub const DEBOUNCE_WINDOW_MS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModeEdge {
    Entered,
    Exited,
}

/// Turns a bursty stream of host notifications into mode edges.
#[derive(Debug)]
pub struct ModeDetector {
    indicators: Indicators,
    monitored_package: Option<String>,
    debounce: Duration,
    last_classified_at: Option<DateTime<Utc>>,
    in_mode: bool,
}

impl ModeDetector {
    pub fn new(indicators: Indicators, monitored_package: Option<String>) -> Self {
        Self {
            indicators,
            monitored_package,
            debounce: Duration::milliseconds(DEBOUNCE_WINDOW_MS),
            last_classified_at: None,
            in_mode: false,
        }
    }

    pub fn in_mode(&self) -> bool {
        self.in_mode
    }

    pub fn set_monitored_package(&mut self, package: Option<String>) {
        self.monitored_package = package;
    }

    /// Classifies `event` and reports a flip of the mode signal, if any.
    ///
    /// Events for the monitored package landing inside the debounce window of
    /// the previous classification are dropped. Leaving the package is never
    /// debounced. A clock that stepped back past the last classification
    /// re-anchors the window instead of silencing events until it catches up.
    pub fn observe(&mut self, event: &HostEvent, now: DateTime<Utc>) -> Option<ModeEdge> {
        if !self.is_monitored(&event.package) {
            return self.apply(false);
        }

        if let Some(last) = self.last_classified_at {
            if now >= last && now - last < self.debounce {
                return None;
            }
        }
        self.last_classified_at = Some(now);

        let signal = match snapshot_of(event) {
            Ok(snapshot) => classify(snapshot, &self.indicators),
            Err(err) => {
                log_debug!("{err}; treating as not in mode");
                false
            }
        };
        self.apply(signal)
    }

    /// Drops the signal to "not in mode", e.g. when monitoring is switched off.
    pub fn force_exit(&mut self) -> Option<ModeEdge> {
        self.apply(false)
    }

    fn is_monitored(&self, package: &str) -> bool {
        self.monitored_package
            .as_deref()
            .map_or(true, |monitored| monitored == package)
    }

    fn apply(&mut self, signal: bool) -> Option<ModeEdge> {
        if signal == self.in_mode {
            return None;
        }
        self.in_mode = signal;
        Some(if signal {
            ModeEdge::Entered
        } else {
            ModeEdge::Exited
        })
    }
}

fn snapshot_of(event: &HostEvent) -> Result<&UiSnapshot, MonitorError> {
    event
        .snapshot
        .as_ref()
        .ok_or(MonitorError::SnapshotUnavailable)
}
