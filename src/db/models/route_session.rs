//! Route session data model.
//!
//! A session is a header row in `route_sessions` plus its ordered points in
//! `route_points`. It is written once, when the tracker closes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RoutePoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSession {
    pub id: String,
    pub activity_label: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub points: Vec<RoutePoint>,
}

impl RouteSession {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Header-only view for list screens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub id: String,
    pub activity_label: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub point_count: u64,
}
