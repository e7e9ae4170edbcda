use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::models::RoutePoint;

use super::{LocationSampler, SampleSink, SamplerError, SamplingRequest, SubscriptionHandle};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Default)]
struct FeedState {
    active: Option<(SubscriptionHandle, SampleSink)>,
    request: Option<SamplingRequest>,
    next_handle: u64,
    subscriptions_opened: u64,
    unavailable_reason: Option<String>,
}

/// Sampler driven by an outer feed of fixes, e.g. a replayed trace or a
/// platform bridge that pushes locations in. Fixes delivered while nobody is
/// subscribed are discarded, matching a real location client.
#[derive(Clone, Default)]
pub struct FeedSampler {
    state: Arc<Mutex<FeedState>>,
}

impl FeedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes later subscribe calls fail, as when location permission is
    /// revoked. `None` restores availability.
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.lock().unavailable_reason = reason;
    }

    /// Forwards a fix to the active subscriber. Returns whether anyone took it.
    pub fn deliver(&self, sample: RoutePoint) -> bool {
        let sink = self.lock().active.as_ref().map(|(_, sink)| sink.clone());
        match sink {
            Some(sink) => {
                sink.push(sample);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Number of subscriptions ever opened on this sampler.
    pub fn subscriptions_opened(&self) -> u64 {
        self.lock().subscriptions_opened
    }

    pub fn last_request(&self) -> Option<SamplingRequest> {
        self.lock().request
    }
}

#[async_trait]
impl LocationSampler for FeedSampler {
    async fn subscribe(
        &self,
        request: SamplingRequest,
        sink: SampleSink,
    ) -> Result<SubscriptionHandle, SamplerError> {
        let mut state = self.lock();
        if let Some(reason) = &state.unavailable_reason {
            return Err(SamplerError::Unavailable(reason.clone()));
        }
        if state.active.is_some() {
            return Err(SamplerError::AlreadySubscribed);
        }

        state.next_handle += 1;
        state.subscriptions_opened += 1;
        let handle = SubscriptionHandle(state.next_handle);
        state.active = Some((handle, sink));
        state.request = Some(request);
        log_info!(
            "Location updates requested {handle} (every {}ms, min {}m)",
            request.interval_ms, request.min_distance_m
        );
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), SamplerError> {
        let mut state = self.lock();
        match state.active {
            Some((active, _)) if active == handle => {
                state.active = None;
                log_info!("Location updates removed {handle}");
                Ok(())
            }
            _ => Err(SamplerError::UnknownHandle(handle)),
        }
    }
}
