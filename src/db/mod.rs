pub mod connection;
pub mod helpers;
pub mod live;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use connection::{Database, StoreTable};
pub use live::LiveQuery;
pub use models::{ActivityEvent, RouteSession, RouteSummary, DEFAULT_ACTIVITY_LABEL};
