use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{db::DEFAULT_ACTIVITY_LABEL, models::RoutePoint, sampler::SubscriptionHandle};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackerPhase {
    #[default]
    Idle,
    Sampling,
}

/// Points taken out of the tracker when a session closes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedRoute {
    pub activity_label: String,
    pub opened_at: DateTime<Utc>,
    pub points: Vec<RoutePoint>,
}

#[derive(Debug, Clone)]
pub struct TrackerState {
    pub current_activity_label: String,
    pub phase: TrackerPhase,
    pub open_route_points: Vec<RoutePoint>,
    /// When the session currently accumulating points was opened.
    pub session_opened_at: Option<DateTime<Utc>>,
    pub subscription: Option<SubscriptionHandle>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::with_label(DEFAULT_ACTIVITY_LABEL)
    }
}

impl TrackerState {
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            current_activity_label: label.into(),
            phase: TrackerPhase::Idle,
            open_route_points: Vec::new(),
            session_opened_at: None,
            subscription: None,
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.phase == TrackerPhase::Sampling
    }

    /// Stores `label` and returns the one it replaced.
    pub fn replace_label(&mut self, label: &str) -> String {
        std::mem::replace(&mut self.current_activity_label, label.to_string())
    }

    /// Appends a fix if a session is open. Returns whether it was kept.
    pub fn append_point(&mut self, point: RoutePoint) -> bool {
        if !self.is_sampling() {
            return false;
        }
        self.open_route_points.push(point);
        true
    }

    /// Takes the open points under `label`, leaving the list empty. A session
    /// that keeps sampling restarts its clock at `now`.
    pub fn take_route(&mut self, label: &str, now: DateTime<Utc>) -> Option<ClosedRoute> {
        let points = std::mem::take(&mut self.open_route_points);
        let opened_at = if self.is_sampling() {
            self.session_opened_at.replace(now)
        } else {
            self.session_opened_at.take()
        };

        if points.is_empty() {
            return None;
        }

        Some(ClosedRoute {
            activity_label: label.to_string(),
            opened_at: opened_at
                .or_else(|| points.first().map(|p| p.timestamp))
                .unwrap_or(now),
            points,
        })
    }

    /// Marks sampling as started before the subscribe call resolves so fixes
    /// delivered during subscription are kept.
    pub fn begin_sampling(&mut self, now: DateTime<Utc>) {
        self.phase = TrackerPhase::Sampling;
        self.session_opened_at.get_or_insert(now);
    }

    /// Leaves `Sampling`, handing back the subscription to cancel. Any points
    /// still open are dropped.
    pub fn end_sampling(&mut self) -> Option<SubscriptionHandle> {
        self.phase = TrackerPhase::Idle;
        self.open_route_points.clear();
        self.session_opened_at = None;
        self.subscription.take()
    }
}
