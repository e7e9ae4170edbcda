pub mod activity_events;
pub mod route_sessions;
