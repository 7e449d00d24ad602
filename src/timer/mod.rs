pub mod controller;
pub mod engine;
pub mod state;

pub use controller::MonitorController;
pub use engine::{EngineSnapshot, EntryOutcome, TickOutcome, TimerEngine, PERSIST_EVERY_TICKS};
pub use state::{TimerState, TimerStatus, Warning, WarningFlags};
