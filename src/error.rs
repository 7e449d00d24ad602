//! Error taxonomy for the monitoring core.
//!
//! Nothing in here is fatal to the monitoring process: callers log these and
//! keep going on in-memory state, or report a denial back to the host.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The host had no active window to hand over. Treated as "not in mode".
    #[error("no UI snapshot available from the host")]
    SnapshotUnavailable,

    /// A store call failed. The engine carries on with its in-memory mirror.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The intervention boundary could not render or dismiss itself.
    #[error("intervention render failure: {0}")]
    Render(String),

    #[error("credential must be exactly {expected} digits")]
    InvalidCredentialFormat { expected: usize },

    #[error("credential does not match")]
    CredentialMismatch,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn persistence(err: impl Display) -> Self {
        MonitorError::Persistence(err.to_string())
    }

    pub fn render(err: impl Display) -> Self {
        MonitorError::Render(err.to_string())
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Persistence(format!("{err:#}"))
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
