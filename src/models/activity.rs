//! Activity-recognition value types.
//!
//! The platform classifier reports activities and transitions as integer
//! codes. These types decode them once at the boundary so the rest of the
//! crate never handles raw codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const CODE_IN_VEHICLE: i32 = 0;
const CODE_ON_BICYCLE: i32 = 1;
const CODE_ON_FOOT: i32 = 2;
const CODE_STILL: i32 = 3;
const CODE_UNKNOWN: i32 = 4;
const CODE_WALKING: i32 = 7;
const CODE_RUNNING: i32 = 8;

const CODE_TRANSITION_ENTER: i32 = 0;
const CODE_TRANSITION_EXIT: i32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Still,
    Walking,
    Running,
    Cycling,
    OnFoot,
    InVehicle,
    Unknown,
}

impl ActivityKind {
    /// Decodes a platform activity code. Codes the tracker does not model
    /// (tilting, future additions) collapse to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            CODE_IN_VEHICLE => ActivityKind::InVehicle,
            CODE_ON_BICYCLE => ActivityKind::Cycling,
            CODE_ON_FOOT => ActivityKind::OnFoot,
            CODE_STILL => ActivityKind::Still,
            CODE_WALKING => ActivityKind::Walking,
            CODE_RUNNING => ActivityKind::Running,
            _ => ActivityKind::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ActivityKind::InVehicle => CODE_IN_VEHICLE,
            ActivityKind::Cycling => CODE_ON_BICYCLE,
            ActivityKind::OnFoot => CODE_ON_FOOT,
            ActivityKind::Still => CODE_STILL,
            ActivityKind::Walking => CODE_WALKING,
            ActivityKind::Running => CODE_RUNNING,
            ActivityKind::Unknown => CODE_UNKNOWN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Still => "Still",
            ActivityKind::Walking => "Walking",
            ActivityKind::Running => "Running",
            ActivityKind::Cycling => "Cycling",
            ActivityKind::OnFoot => "OnFoot",
            ActivityKind::InVehicle => "InVehicle",
            ActivityKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Enter,
    Exit,
    Unknown,
}

impl TransitionKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            CODE_TRANSITION_ENTER => TransitionKind::Enter,
            CODE_TRANSITION_EXIT => TransitionKind::Exit,
            _ => TransitionKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Enter => "Enter",
            TransitionKind::Exit => "Exit",
            TransitionKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single enter/exit notification from the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub activity: ActivityKind,
    pub transition: TransitionKind,
    pub observed_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(
        activity: ActivityKind,
        transition: TransitionKind,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            activity,
            transition,
            observed_at,
        }
    }

    pub fn from_codes(activity_code: i32, transition_code: i32, observed_at: DateTime<Utc>) -> Self {
        Self::new(
            ActivityKind::from_code(activity_code),
            TransitionKind::from_code(transition_code),
            observed_at,
        )
    }

    /// An event the tracker cannot act on: either half failed to decode.
    pub fn is_malformed(&self) -> bool {
        self.activity == ActivityKind::Unknown || self.transition == TransitionKind::Unknown
    }

    /// Same (activity, transition) pair, ignoring when it was observed.
    pub fn same_kind(&self, other: &TransitionEvent) -> bool {
        self.activity == other.activity && self.transition == other.transition
    }

    /// History line, e.g. `Walking - Enter`.
    pub fn describe(&self) -> String {
        format!("{} - {}", self.activity, self.transition)
    }
}

/// Probabilistic activity reading delivered alongside transitions. Only
/// logged; it never drives the tracker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedActivity {
    pub activity: ActivityKind,
    pub confidence: u8,
}
