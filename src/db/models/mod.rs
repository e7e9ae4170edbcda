pub mod activity_event;
pub mod route_session;

pub use activity_event::{ActivityEvent, DEFAULT_ACTIVITY_LABEL};
pub use route_session::{RouteSession, RouteSummary};
