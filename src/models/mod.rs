pub mod activity;
pub mod location;

pub use activity::{ActivityKind, DetectedActivity, TransitionEvent, TransitionKind};
pub use location::RoutePoint;
