use std::sync::atomic::{AtomicBool, Ordering};

/// Flags scoped to one monitoring process, owned by its supervisor and handed
/// to the state machine at construction.
#[derive(Debug, Default)]
pub struct SessionContext {
    bypass_engaged: AtomicBool,
    monitoring: AtomicBool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage_bypass(&self) {
        self.bypass_engaged.store(true, Ordering::SeqCst);
    }

    /// Clears the bypass flag and reports whether it was set.
    pub fn take_bypass(&self) -> bool {
        self.bypass_engaged.swap(false, Ordering::SeqCst)
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass_engaged.load(Ordering::SeqCst)
    }

    pub fn set_monitoring(&self, running: bool) {
        self.monitoring.store(running, Ordering::SeqCst);
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }
}
