use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{ActivityEvent, RouteSession},
    models::{ActivityKind, TransitionEvent, TransitionKind},
    sampler::{LocationSampler, SampleSink, SamplingRequest},
    store::SessionWriter,
};

use super::{
    lifecycle::LifecycleHooks,
    state::{ClosedRoute, TrackerPhase, TrackerState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub current_activity_label: String,
    pub phase: TrackerPhase,
    pub open_point_count: usize,
    pub session_opened_at: Option<DateTime<Utc>>,
}

fn lock(state: &Mutex<TrackerState>) -> MutexGuard<'_, TrackerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Turns accepted transitions into sampling decisions, route sessions and
/// history entries.
///
/// Transition handling is serialized by `gate`. `state` is shared with the
/// sample sink and is only ever locked for short, non-awaiting sections, so a
/// session close can never observe a half-appended point list.
#[derive(Clone)]
pub struct Tracker {
    state: Arc<Mutex<TrackerState>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    sampler: Arc<dyn LocationSampler>,
    writer: SessionWriter,
    lifecycle: Arc<dyn LifecycleHooks>,
    sampling_request: SamplingRequest,
}

impl Tracker {
    pub fn new(
        initial_label: impl Into<String>,
        sampler: Arc<dyn LocationSampler>,
        writer: SessionWriter,
        lifecycle: Arc<dyn LifecycleHooks>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::with_label(initial_label))),
            gate: Arc::new(tokio::sync::Mutex::new(())),
            sampler,
            writer,
            lifecycle,
            sampling_request: SamplingRequest::default(),
        }
    }

    pub fn with_sampling_request(mut self, request: SamplingRequest) -> Self {
        self.sampling_request = request;
        self
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = lock(&self.state);
        TrackerSnapshot {
            current_activity_label: state.current_activity_label.clone(),
            phase: state.phase,
            open_point_count: state.open_route_points.len(),
            session_opened_at: state.session_opened_at,
        }
    }

    /// Sink handed to the sampler. Fixes arriving while idle are dropped.
    pub fn sample_sink(&self) -> SampleSink {
        let state = Arc::clone(&self.state);
        SampleSink::new(move |point| {
            let kept = lock(&state).append_point(point);
            if kept {
                log_debug!("New location: {}, {}", point.latitude, point.longitude);
            } else {
                log_debug!(
                    "Dropped location {}, {} outside of a route session",
                    point.latitude,
                    point.longitude
                );
            }
        })
    }

    /// Handles a forwarded batch. The state machine acts on the last event,
    /// which is the current state; earlier ones only go to history.
    pub async fn handle_batch(&self, events: &[TransitionEvent]) {
        let Some((last, earlier)) = events.split_last() else {
            log_warn!("No activity transition events found");
            return;
        };

        let _gate = self.gate.lock().await;
        for event in earlier {
            log_info!(
                "Transition {} superseded by {} in the same batch",
                event.describe(),
                last.describe()
            );
            self.record_transition(event);
        }
        self.apply(last).await;
    }

    pub async fn handle_transition(&self, event: TransitionEvent) {
        let _gate = self.gate.lock().await;
        self.apply(&event).await;
    }

    /// Appends a lifecycle milestone (service start/stop and similar).
    pub fn record_milestone(&self, description: impl Into<String>) {
        self.writer
            .append_event(ActivityEvent::milestone(Utc::now(), description));
    }

    /// Waits until every queued history and route write was attempted.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Stops sampling without persisting. Points of an open session are lost,
    /// as they would be if the process died.
    pub async fn shutdown(&self) {
        let _gate = self.gate.lock().await;
        let (dropped, handle) = {
            let mut state = lock(&self.state);
            let dropped = state.open_route_points.len();
            (dropped, state.end_sampling())
        };
        if dropped > 0 {
            log_warn!("Tracker shutting down with {dropped} unsaved route points");
        }
        if let Some(handle) = handle {
            if let Err(err) = self.sampler.unsubscribe(handle).await {
                log_error!("Failed to remove location updates on shutdown: {err}");
            }
        }
    }

    fn record_transition(&self, event: &TransitionEvent) {
        self.writer.append_event(ActivityEvent::new(
            event.observed_at,
            event.describe(),
            Some(event.activity.as_str().to_string()),
        ));
    }

    async fn apply(&self, event: &TransitionEvent) {
        let label = event.activity.as_str();
        let at = event.observed_at;
        let before = lock(&self.state).replace_label(label);

        log_info!(
            "handleActivityTransition({}, {}), previous activity {}",
            event.activity,
            event.transition,
            before
        );
        self.record_transition(event);

        match (event.activity, event.transition) {
            (ActivityKind::Still, TransitionKind::Enter) => {
                self.close_and_stop(&before, at).await;
                self.lifecycle.may_exit_continuous_tracking();
            }
            (ActivityKind::Still, _) => {}
            (_, TransitionKind::Enter) => {
                if before != label {
                    self.close_session(&before, at);
                }
                self.lifecycle.enter_continuous_tracking();
                self.start_sampling(at).await;
            }
            (_, TransitionKind::Exit) => {
                self.close_and_stop(&before, at).await;
            }
            (_, TransitionKind::Unknown) => {
                log_warn!("Ignoring transition of unknown type for {}", event.activity);
            }
        }
    }

    /// Persists the open points under `label` and keeps sampling.
    fn close_session(&self, label: &str, at: DateTime<Utc>) {
        let closed = lock(&self.state).take_route(label, at);
        self.persist(closed, at);
    }

    /// Persists the open points under `label`, then leaves `Sampling`. Both
    /// happen under one lock so no fix can slip in between.
    async fn close_and_stop(&self, label: &str, at: DateTime<Utc>) {
        let (closed, handle) = {
            let mut state = lock(&self.state);
            let closed = state.take_route(label, at);
            (closed, state.end_sampling())
        };
        self.persist(closed, at);

        if let Some(handle) = handle {
            log_info!("Stopping location updates {handle}");
            if let Err(err) = self.sampler.unsubscribe(handle).await {
                log_error!("Failed to remove location updates: {err}");
            }
        }
    }

    async fn start_sampling(&self, at: DateTime<Utc>) {
        {
            let mut state = lock(&self.state);
            if state.is_sampling() {
                log_debug!("Location updates already active");
                return;
            }
            state.begin_sampling(at);
        }

        log_info!("Starting location updates");
        match self
            .sampler
            .subscribe(self.sampling_request, self.sample_sink())
            .await
        {
            Ok(handle) => {
                lock(&self.state).subscription = Some(handle);
            }
            Err(err) => {
                log_error!("Failed to request location updates: {err}");
                lock(&self.state).end_sampling();
            }
        }
    }

    fn persist(&self, closed: Option<ClosedRoute>, at: DateTime<Utc>) {
        let Some(route) = closed else {
            return;
        };

        log_info!(
            "Closing route for {} with {} points",
            route.activity_label,
            route.points.len()
        );
        self.writer.append_route(RouteSession {
            id: Uuid::new_v4().to_string(),
            activity_label: route.activity_label,
            opened_at: route.opened_at,
            closed_at: at,
            points: route.points,
        });
    }
}
