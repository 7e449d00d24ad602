use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use crate::error::MonitorError;

pub const DEFAULT_SESSION_BUDGET_MS: u64 = 10 * 60 * 1000;
pub const DEFAULT_BYPASS_CREDENTIAL: &str = "1234";
pub const DEFAULT_MONITORED_PACKAGE: &str = "com.google.android.youtube";
pub const CREDENTIAL_LEN: usize = 4;

/// Settings the core reads at the start of every session. Written by the
/// settings editor, never by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub session_budget_ms: u64,
    pub bypass_credential: String,
    /// Images/videos the intervention renders. Opaque to the core.
    pub monster_asset_paths: Vec<String>,
    /// `None` treats every foreground package as the monitored one.
    pub monitored_package: Option<String>,
    pub monitoring_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_budget_ms: DEFAULT_SESSION_BUDGET_MS,
            bypass_credential: DEFAULT_BYPASS_CREDENTIAL.into(),
            monster_asset_paths: Vec::new(),
            monitored_package: Some(DEFAULT_MONITORED_PACKAGE.into()),
            monitoring_enabled: true,
        }
    }
}

impl Config {
    pub fn with_budget_minutes(mut self, minutes: u64) -> Self {
        self.session_budget_ms = minutes.saturating_mul(60_000);
        self
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.session_budget_ms == 0 {
            return Err(MonitorError::Config(
                "session budget must be greater than zero".into(),
            ));
        }
        if !is_credential_shaped(&self.bypass_credential) {
            return Err(MonitorError::Config(format!(
                "bypass credential must be {CREDENTIAL_LEN} digits"
            )));
        }
        Ok(())
    }
}

pub fn is_credential_shaped(value: &str) -> bool {
    value.len() == CREDENTIAL_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Read-only view of the settings, loaded once per session start.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Config;
}

impl SettingsSource for Config {
    fn load(&self) -> Config {
        self.clone()
    }
}

/// Modification time and length of the settings file when it was last read.
type FileStamp = Option<(SystemTime, u64)>;

fn stamp_of(path: &Path) -> FileStamp {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

struct Cached {
    config: Config,
    stamp: FileStamp,
}

/// JSON settings file shared with the settings editor. `load` re-reads the
/// file whenever another process has rewritten it since the last read.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Cached>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let stamp = stamp_of(&path);
        let config = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Config>(&contents) {
                Ok(config) if config.validate().is_ok() => config,
                Ok(_) | Err(_) => {
                    warn!(
                        "Settings at {} are unusable; falling back to defaults",
                        path.display()
                    );
                    Config::default()
                }
            }
        } else {
            Config::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(Cached { config, stamp }),
        })
    }

    pub fn config(&self) -> Config {
        match self.data.read() {
            Ok(guard) => guard.config.clone(),
            Err(poisoned) => poisoned.into_inner().config.clone(),
        }
    }

    pub fn update(&self, config: Config) -> Result<()> {
        config.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&config)?;
        guard.stamp = stamp_of(&self.path);
        guard.config = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let stamp = stamp_of(&self.path);
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Recorded before parsing so a broken file is reported once, not on
        // every load.
        guard.stamp = stamp;
        let data: Config = serde_json::from_str(&contents)?;
        data.validate()?;
        guard.config = data;
        Ok(())
    }

    /// Reloads when the file on disk no longer matches what was last read.
    /// A missing or broken file keeps the cached settings.
    pub fn refresh(&self) {
        let current = stamp_of(&self.path);
        if current.is_none() {
            return;
        }
        let cached = match self.data.read() {
            Ok(guard) => guard.stamp,
            Err(poisoned) => poisoned.into_inner().stamp,
        };
        if cached == current {
            return;
        }
        match self.reload() {
            Ok(()) => info!("Reloaded settings from {}", self.path.display()),
            Err(err) => warn!(
                "Ignoring settings at {}: {err:#}; keeping previous values",
                self.path.display()
            ),
        }
    }

    fn persist(&self, data: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

impl SettingsSource for SettingsStore {
    fn load(&self) -> Config {
        self.refresh();
        self.config()
    }
}
