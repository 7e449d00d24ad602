//! Outbound JSON-lines channel to the host shell.
//!
//! Each signal is one JSON object per line with an `event` tag. The host
//! draws the intervention and the warning toasts from these.

use std::{
    io::{self, Stdout, Write},
    sync::{Arc, Mutex},
};

use serde::Serialize;

use crate::{
    bypass::BypassOutcome,
    error::{MonitorError, Result},
    hooks::{AlertSink, InterventionSink},
    monitor::MonitorSnapshot,
    sensing::ModeEdge,
    settings::SettingsSource,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// Show the full-screen intervention with one of these images.
    InterventionActivated {
        #[serde(rename = "assetPaths")]
        asset_paths: Vec<String>,
    },
    InterventionDismissed,
    Warning {
        message: String,
    },
    Status {
        #[serde(rename = "remainingMs")]
        remaining_ms: u64,
    },
    ModeChanged {
        edge: ModeEdge,
    },
    Bypass {
        outcome: BypassOutcome,
    },
    Snapshot {
        snapshot: MonitorSnapshot,
    },
    Error {
        message: String,
    },
}

pub struct EventEmitter<W: Write + Send> {
    writer: Mutex<W>,
    settings: Arc<dyn SettingsSource>,
}

impl EventEmitter<Stdout> {
    pub fn stdout(settings: Arc<dyn SettingsSource>) -> Self {
        Self::new(io::stdout(), settings)
    }
}

impl<W: Write + Send> EventEmitter<W> {
    /// Asset paths are read from `settings` each time the intervention is
    /// shown.
    pub fn new(writer: W, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            writer: Mutex::new(writer),
            settings,
        }
    }

    pub fn emit(&self, event: &MonitorEvent) -> Result<()> {
        let line = serde_json::to_string(event).map_err(MonitorError::render)?;
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(writer, "{line}").map_err(MonitorError::render)?;
        writer.flush().map_err(MonitorError::render)
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> InterventionSink for EventEmitter<W> {
    fn activate_intervention(&self) -> Result<()> {
        self.emit(&MonitorEvent::InterventionActivated {
            asset_paths: self.settings.load().monster_asset_paths,
        })
    }

    fn dismiss_intervention(&self) -> Result<()> {
        self.emit(&MonitorEvent::InterventionDismissed)
    }
}

impl<W: Write + Send> AlertSink for EventEmitter<W> {
    fn emit_warning(&self, message: &str) -> Result<()> {
        self.emit(&MonitorEvent::Warning {
            message: message.to_string(),
        })
    }

    fn emit_status(&self, remaining_ms: u64) -> Result<()> {
        self.emit(&MonitorEvent::Status { remaining_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Config, SettingsStore};
    use serde_json::{json, Value};

    fn lines(emitter: EventEmitter<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(emitter.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn sinks_write_one_tagged_object_per_line() {
        let config = Config {
            monster_asset_paths: vec!["monsters/grumpy.png".into()],
            ..Config::default()
        };
        let emitter = EventEmitter::new(Vec::new(), Arc::new(config));

        emitter.emit_status(61_000).unwrap();
        emitter.emit_warning("1 minute left! The monster is coming!").unwrap();
        emitter.activate_intervention().unwrap();
        emitter.dismiss_intervention().unwrap();

        assert_eq!(
            lines(emitter),
            vec![
                json!({"event": "status", "remainingMs": 61_000}),
                json!({"event": "warning", "message": "1 minute left! The monster is coming!"}),
                json!({"event": "interventionActivated", "assetPaths": ["monsters/grumpy.png"]}),
                json!({"event": "interventionDismissed"}),
            ]
        );
    }

    #[test]
    fn bypass_outcomes_carry_the_denial_reason() {
        let emitter = EventEmitter::new(Vec::new(), Arc::new(Config::default()));
        emitter
            .emit(&MonitorEvent::Bypass {
                outcome: BypassOutcome::Denied(crate::bypass::DenialReason::InvalidFormat),
            })
            .unwrap();
        emitter
            .emit(&MonitorEvent::Bypass {
                outcome: BypassOutcome::Granted,
            })
            .unwrap();

        assert_eq!(
            lines(emitter),
            vec![
                json!({"event": "bypass", "outcome": {"outcome": "denied", "reason": "invalidFormat"}}),
                json!({"event": "bypass", "outcome": {"outcome": "granted"}}),
            ]
        );
    }

    #[test]
    fn intervention_uses_the_assets_saved_since_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Arc::new(SettingsStore::new(path.clone()).unwrap());
        let emitter = EventEmitter::new(Vec::new(), settings);

        emitter.activate_intervention().unwrap();
        SettingsStore::new(path)
            .unwrap()
            .update(Config {
                monster_asset_paths: vec!["monsters/late.png".into()],
                ..Config::default()
            })
            .unwrap();
        emitter.activate_intervention().unwrap();

        assert_eq!(
            lines(emitter),
            vec![
                json!({"event": "interventionActivated", "assetPaths": []}),
                json!({"event": "interventionActivated", "assetPaths": ["monsters/late.png"]}),
            ]
        );
    }
}
