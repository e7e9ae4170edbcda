//! Location sampling seam.
//!
//! The platform's fused-location client lives outside this crate. The tracker
//! only asks it to start or stop delivering fixes into a [`SampleSink`].

pub mod feed;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RoutePoint;

pub use feed::FeedSampler;

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("location updates unavailable: {0}")]
    Unavailable(String),
    #[error("a location subscription is already active")]
    AlreadySubscribed,
    #[error("unknown subscription handle {0}")]
    UnknownHandle(SubscriptionHandle),
}

/// How often the platform should deliver fixes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    pub interval_ms: u64,
    pub min_interval_ms: u64,
    pub max_delay_ms: u64,
    pub min_distance_m: f32,
}

impl Default for SamplingRequest {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            min_interval_ms: 100,
            max_delay_ms: 1000,
            min_distance_m: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receiving end for location fixes. Cheap to clone; `push` may be called
/// from any thread.
#[derive(Clone)]
pub struct SampleSink {
    deliver: Arc<dyn Fn(RoutePoint) + Send + Sync>,
}

impl SampleSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(RoutePoint) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn push(&self, sample: RoutePoint) {
        (self.deliver)(sample);
    }
}

impl fmt::Debug for SampleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleSink").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait LocationSampler: Send + Sync + 'static {
    async fn subscribe(
        &self,
        request: SamplingRequest,
        sink: SampleSink,
    ) -> Result<SubscriptionHandle, SamplerError>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SamplerError>;
}
