//! Recording sinks shared by the unit tests.

use std::sync::Mutex;

use crate::{
    error::{MonitorError, Result},
    hooks::{AlertSink, InterventionSink},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Signal {
    Activate,
    Dismiss,
    Warning(String),
    Status(u64),
}

#[derive(Debug, Default)]
pub(crate) struct Recorder {
    signals: Mutex<Vec<Signal>>,
    fail_intervention: Mutex<bool>,
}

impl Recorder {
    pub(crate) fn fail_intervention(&self, fail: bool) {
        *self.fail_intervention.lock().unwrap() = fail;
    }

    pub(crate) fn signals(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, signal: Signal) -> usize {
        self.signals().into_iter().filter(|s| *s == signal).count()
    }

    pub(crate) fn warnings(&self) -> Vec<String> {
        self.signals()
            .into_iter()
            .filter_map(|s| match s {
                Signal::Warning(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn last_status(&self) -> Option<u64> {
        self.signals().into_iter().rev().find_map(|s| match s {
            Signal::Status(remaining) => Some(remaining),
            _ => None,
        })
    }

    fn push(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }
}

impl InterventionSink for Recorder {
    fn activate_intervention(&self) -> Result<()> {
        self.push(Signal::Activate);
        if *self.fail_intervention.lock().unwrap() {
            return Err(MonitorError::render("overlay permission revoked"));
        }
        Ok(())
    }

    fn dismiss_intervention(&self) -> Result<()> {
        self.push(Signal::Dismiss);
        Ok(())
    }
}

impl AlertSink for Recorder {
    fn emit_warning(&self, message: &str) -> Result<()> {
        self.push(Signal::Warning(message.to_string()));
        Ok(())
    }

    fn emit_status(&self, remaining_ms: u64) -> Result<()> {
        self.push(Signal::Status(remaining_ms));
        Ok(())
    }
}
