//! Registration with the platform activity classifier.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ActivityKind, TransitionKind};

/// Activities whose enter and exit transitions are requested.
pub const TRACKED_ACTIVITIES: [ActivityKind; 6] = [
    ActivityKind::Walking,
    ActivityKind::Running,
    ActivityKind::OnFoot,
    ActivityKind::Cycling,
    ActivityKind::Still,
    ActivityKind::InVehicle,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub activity: ActivityKind,
    pub transition: TransitionKind,
}

impl TransitionRequest {
    /// Enter and exit for every tracked activity.
    pub fn all() -> Vec<TransitionRequest> {
        TRACKED_ACTIVITIES
            .iter()
            .flat_map(|&activity| {
                [TransitionKind::Enter, TransitionKind::Exit]
                    .into_iter()
                    .map(move |transition| TransitionRequest {
                        activity,
                        transition,
                    })
            })
            .collect()
    }
}

#[async_trait]
pub trait ClassifierRegistration: Send + Sync + 'static {
    /// Asks the platform to start delivering the given transitions.
    async fn register(&self, requests: &[TransitionRequest]) -> Result<()>;
}

/// Registration that only remembers what was asked for. Used when transitions
/// are fed in from outside, e.g. by the replay binary.
#[derive(Clone, Default)]
pub struct RecordingRegistration {
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Vec<TransitionRequest>>>,
    refuse: bool,
}

impl RecordingRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registration that always fails, as when permission is missing.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_requests(&self) -> Vec<TransitionRequest> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ClassifierRegistration for RecordingRegistration {
    async fn register(&self, requests: &[TransitionRequest]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            bail!("activity recognition permission not granted");
        }
        *self
            .last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = requests.to_vec();
        Ok(())
    }
}
