use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::{
    db::Database,
    settings::{Config, SettingsStore},
    utils::{Clock, SystemClock},
};

pub const DB_FILE_NAME: &str = "monster-timer.sqlite3";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Parser)]
#[command(name = "monster-timer", version, about = "Short-form video budget monitor")]
pub struct Cli {
    /// Directory holding the database and settings file.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Monitor host events from stdin (default)
    Run,
    /// Print the persisted countdown and today's usage
    Status,
    /// Print usage for the last seven days
    Stats {
        /// Also list the most recent watch sessions
        #[arg(long, default_value_t = 0)]
        sessions: u32,
    },
    /// Clear the persisted countdown
    Reset {
        /// Also delete usage history
        #[arg(long)]
        usage: bool,
    },
    /// Settings management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set(ConfigUpdate),
}

#[derive(Debug, Args)]
pub struct ConfigUpdate {
    #[arg(long)]
    pub budget_minutes: Option<u64>,
    #[arg(long)]
    pub credential: Option<String>,
    /// Package to watch; "any" watches every foreground app
    #[arg(long)]
    pub package: Option<String>,
    #[arg(long)]
    pub monitoring: Option<bool>,
    /// Replace the intervention assets (repeatable)
    #[arg(long = "asset")]
    pub assets: Vec<String>,
}

impl ConfigUpdate {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(minutes) = self.budget_minutes {
            config = config.with_budget_minutes(minutes);
        }
        if let Some(credential) = self.credential {
            config.bypass_credential = credential;
        }
        if let Some(package) = self.package {
            config.monitored_package = (package != "any").then_some(package);
        }
        if let Some(enabled) = self.monitoring {
            config.monitoring_enabled = enabled;
        }
        if !self.assets.is_empty() {
            config.monster_asset_paths = self.assets;
        }
        config
    }
}

pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    dirs::data_local_dir()
        .map(|base| base.join("monster-timer"))
        .ok_or_else(|| anyhow!("could not determine a data directory; pass --data-dir"))
}

pub fn open_database(data_dir: &std::path::Path) -> Result<Database> {
    Database::new(data_dir.join(DB_FILE_NAME))
}

pub fn open_settings(data_dir: &std::path::Path) -> Result<SettingsStore> {
    SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME))
}

pub async fn status(data_dir: &std::path::Path) -> Result<()> {
    let db = open_database(data_dir)?;
    let clock = SystemClock;
    let now = Utc::now();

    let state = db.get_timer_state().await?;
    let today = db.get_usage(clock.today()).await?;
    let report = json!({
        "timerState": state,
        "adjustedRemainingMs": state.map(|s| s.adjusted_remaining_ms(now)),
        "today": today,
        "watchedToday": today.formatted_watch_time(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn stats(data_dir: &std::path::Path, sessions: u32) -> Result<()> {
    let db = open_database(data_dir)?;
    let week = db.get_weekly_usage(SystemClock.today()).await?;

    println!("{:<12} {:>8} {:>8} {:>13}", "date", "watched", "expired", "stopped early");
    for day in &week.days {
        println!(
            "{:<12} {:>8} {:>8} {:>13}",
            day.date.to_string(),
            day.formatted_watch_time(),
            day.times_expired,
            day.times_stopped_early
        );
    }
    println!(
        "{:<12} {:>8} {:>8} {:>13}",
        "total",
        week.formatted_total(),
        week.total_expired(),
        week.total_stopped_early()
    );

    if sessions > 0 {
        println!();
        for session in db.list_recent_watch_sessions(sessions).await? {
            println!(
                "{}  {}  {}s",
                session.started_at.to_rfc3339(),
                session.id,
                session.duration_secs
            );
        }
    }
    Ok(())
}

pub async fn reset(data_dir: &std::path::Path, usage: bool) -> Result<()> {
    let db = open_database(data_dir)?;
    db.clear_timer_state().await?;
    println!("Timer state cleared");
    if usage {
        let days = db.clear_usage().await?;
        let sessions = db.clear_watch_sessions().await?;
        println!("Deleted {days} usage days and {sessions} watch sessions");
    }
    Ok(())
}

pub fn config(data_dir: &std::path::Path, action: ConfigAction) -> Result<()> {
    let settings = open_settings(data_dir)?;
    match action {
        ConfigAction::Show => {}
        ConfigAction::Set(update) => {
            let updated = update.apply(settings.config());
            settings
                .update(updated)
                .context("failed to save settings")?;
        }
    }
    println!("{}", serde_json::to_string_pretty(&settings.config())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["monster-timer"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn config_set_parses_every_flag() {
        let cli = Cli::try_parse_from([
            "monster-timer",
            "--data-dir",
            "/tmp/mt",
            "config",
            "set",
            "--budget-minutes",
            "15",
            "--credential",
            "4821",
            "--package",
            "any",
            "--monitoring",
            "false",
            "--asset",
            "a.png",
            "--asset",
            "b.png",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/mt")));
        let Some(Commands::Config {
            action: ConfigAction::Set(update),
        }) = cli.command
        else {
            panic!("expected config set");
        };

        let config = update.apply(Config::default());
        assert_eq!(config.session_budget_ms, 900_000);
        assert_eq!(config.bypass_credential, "4821");
        assert_eq!(config.monitored_package, None);
        assert!(!config.monitoring_enabled);
        assert_eq!(config.monster_asset_paths, vec!["a.png", "b.png"]);
    }

    #[test]
    fn config_set_keeps_unmentioned_fields() {
        let update = ConfigUpdate {
            budget_minutes: None,
            credential: Some("9999".into()),
            package: None,
            monitoring: None,
            assets: Vec::new(),
        };
        let config = update.apply(Config::default());
        assert_eq!(config.session_budget_ms, Config::default().session_budget_ms);
        assert_eq!(config.monitored_package, Config::default().monitored_package);
    }
}
