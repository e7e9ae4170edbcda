pub mod controller;
pub mod dedup;
pub mod lifecycle;
pub mod state;

pub use controller::{Tracker, TrackerSnapshot};
pub use dedup::{TransitionDeduplicator, Verdict, DEFAULT_SUPPRESSION_WINDOW_SECS};
pub use lifecycle::{ForegroundState, LifecycleHooks};
pub use state::{ClosedRoute, TrackerPhase, TrackerState};
