use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Signals from the tracker to whatever keeps the process alive.
pub trait LifecycleHooks: Send + Sync + 'static {
    /// A moving activity began; keep tracking continuously.
    fn enter_continuous_tracking(&self);

    /// The device came to rest; continuous tracking may end.
    fn may_exit_continuous_tracking(&self);
}

/// Foreground-mode flag owned by the host instead of a process-wide static.
#[derive(Clone, Default)]
pub struct ForegroundState {
    in_foreground: Arc<AtomicBool>,
    exits: Arc<AtomicU64>,
}

impl ForegroundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_foreground(&self) -> bool {
        self.in_foreground.load(Ordering::SeqCst)
    }

    /// How many times continuous tracking was released.
    pub fn exit_count(&self) -> u64 {
        self.exits.load(Ordering::SeqCst)
    }
}

impl LifecycleHooks for ForegroundState {
    fn enter_continuous_tracking(&self) {
        let was = self.in_foreground.swap(true, Ordering::SeqCst);
        log_info!("Continuous tracking requested. Already active: {was}");
    }

    fn may_exit_continuous_tracking(&self) {
        self.in_foreground.store(false, Ordering::SeqCst);
        self.exits.fetch_add(1, Ordering::SeqCst);
        log_info!("Continuous tracking released");
    }
}
