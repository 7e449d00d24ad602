use serde::Serialize;

use crate::{
    error::{MonitorError, Result},
    settings::{is_credential_shaped, CREDENTIAL_LEN},
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DenialReason {
    InvalidFormat,
    Mismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome", content = "reason")]
pub enum BypassOutcome {
    Granted,
    Denied(DenialReason),
}

impl BypassOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, BypassOutcome::Granted)
    }
}

/// Checks a typed credential against the configured one.
///
/// There is no lockout: every attempt is evaluated. Failures are only counted
/// so they show up in the logs.
#[derive(Debug, Default)]
pub struct BypassGate {
    failed_attempts: u32,
}

impl BypassGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn check(&mut self, candidate: &str, configured: &str) -> Result<()> {
        let result = if !is_credential_shaped(candidate) {
            Err(MonitorError::InvalidCredentialFormat {
                expected: CREDENTIAL_LEN,
            })
        } else if candidate != configured {
            Err(MonitorError::CredentialMismatch)
        } else {
            Ok(())
        };

        match &result {
            Ok(()) => self.failed_attempts = 0,
            Err(err) => {
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                log_warn!(
                    "Bypass denied ({err}); {} consecutive failures",
                    self.failed_attempts
                );
            }
        }
        result
    }

    pub fn outcome_of(result: &Result<()>) -> BypassOutcome {
        match result {
            Ok(()) => BypassOutcome::Granted,
            Err(MonitorError::InvalidCredentialFormat { .. }) => {
                BypassOutcome::Denied(DenialReason::InvalidFormat)
            }
            Err(_) => BypassOutcome::Denied(DenialReason::Mismatch),
        }
    }
}
