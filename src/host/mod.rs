//! Service lifetime around the tracker: classifier registration, transition
//! intake, foreground signalling and shutdown.

pub mod handle;
pub mod replay;
pub mod service;

pub use handle::HostHandle;
pub use replay::{parse_line, replay, ReplayLine, ReplayStats};
pub use service::{HostCommand, HostDeps, TrackerHost};
