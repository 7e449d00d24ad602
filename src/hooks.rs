//! Outbound boundaries: the full-screen intervention and the alert channel.
//!
//! Both are fire-and-forget from the core's point of view. Whatever state the
//! core needs is recorded before these are called, so a failure here is only
//! ever logged.

use crate::error::Result;

pub trait InterventionSink: Send + Sync {
    fn activate_intervention(&self) -> Result<()>;
    fn dismiss_intervention(&self) -> Result<()>;
}

pub trait AlertSink: Send + Sync {
    fn emit_warning(&self, message: &str) -> Result<()>;
    fn emit_status(&self, remaining_ms: u64) -> Result<()>;
}
