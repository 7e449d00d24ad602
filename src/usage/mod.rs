pub mod accountant;
pub mod ledger;
pub mod models;

pub use accountant::SessionAccountant;
pub use ledger::UsageLedger;
pub use models::{format_duration_secs, UsageRecord, WatchSession, WeeklyUsage};
