pub mod bypass;
pub mod cli;
pub mod context;
pub mod db;
pub mod emitter;
pub mod error;
pub mod hooks;
pub mod host;
pub mod monitor;
pub mod sensing;
pub mod settings;
pub mod store;
pub mod timer;
pub mod usage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use tokio::io::BufReader;

pub use bypass::{BypassGate, BypassOutcome, DenialReason};
pub use context::SessionContext;
pub use db::Database;
pub use emitter::{EventEmitter, MonitorEvent};
pub use error::{MonitorError, Result};
pub use hooks::{AlertSink, InterventionSink};
pub use monitor::{Collaborators, Monitor, MonitorSnapshot};
pub use sensing::{HostEvent, ModeDetector, ModeEdge, UiNode, UiSnapshot};
pub use settings::{Config, SettingsSource, SettingsStore};
pub use store::{MemoryStore, StateStore};
pub use timer::{MonitorController, TimerEngine, TimerState, TimerStatus};
pub use usage::{SessionAccountant, UsageLedger, UsageRecord, WatchSession, WeeklyUsage};
pub use utils::{Clock, ManualClock, SystemClock};

use cli::{Cli, Commands};

pub async fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var). Logs go to stderr; stdout
    // carries the host protocol.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let data_dir = cli::resolve_data_dir(cli.data_dir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_monitor(&data_dir).await,
        Commands::Status => cli::status(&data_dir).await,
        Commands::Stats { sessions } => cli::stats(&data_dir, sessions).await,
        Commands::Reset { usage } => cli::reset(&data_dir, usage).await,
        Commands::Config { action } => cli::config(&data_dir, action),
    }
}

async fn run_monitor(data_dir: &Path) -> anyhow::Result<()> {
    info!("Monster timer starting up...");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let database = cli::open_database(data_dir)?;
    let settings = Arc::new(cli::open_settings(data_dir)?);
    let config = settings.config();
    if let Err(err) = config.validate() {
        warn!("{err}; sessions will fall back to defaults");
    }

    let emitter = Arc::new(EventEmitter::stdout(settings.clone()));
    let context = Arc::new(SessionContext::new());
    let controller = MonitorController::new(
        Collaborators {
            store: Arc::new(database),
            settings,
            intervention: emitter.clone(),
            alerts: emitter.clone(),
            clock: Arc::new(SystemClock),
        },
        context,
    );

    controller.start().await;

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = host::serve(&controller, emitter.as_ref(), stdin) => match result {
            Ok(()) => info!("Host closed the event stream"),
            Err(err) => error!("Host channel failed: {err:#}"),
        },
        _ = tokio::signal::ctrl_c() => info!("Interrupted; shutting down"),
    }

    controller.shutdown().await;
    info!("Monster timer stopped");
    Ok(())
}
