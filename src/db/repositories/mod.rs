pub mod timer_state;
pub mod usage;
pub mod watch_sessions;

pub use timer_state::TimerStateRepository;
pub use usage::UsageRepository;
pub use watch_sessions::WatchSessionRepository;
