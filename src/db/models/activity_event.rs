//! Activity history data model.
//!
//! One row per accepted transition plus lifecycle milestones such as the
//! host starting or stopping. The log is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label reported when no event carrying an activity has been stored yet.
pub const DEFAULT_ACTIVITY_LABEL: &str = "No activity detected";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Assigned by the store; `None` until inserted.
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub activity_label: Option<String>,
}

impl ActivityEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        description: impl Into<String>,
        activity_label: Option<String>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            description: description.into(),
            activity_label,
        }
    }

    /// A lifecycle milestone that does not change the current activity.
    pub fn milestone(timestamp: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self::new(timestamp, description, None)
    }
}
