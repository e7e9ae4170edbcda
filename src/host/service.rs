use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    classifier::{ClassifierRegistration, TransitionRequest},
    db::DEFAULT_ACTIVITY_LABEL,
    models::{DetectedActivity, TransitionEvent},
    sampler::LocationSampler,
    settings::TrackerSettings,
    store::{SessionStore, SessionWriter},
    tracker::{
        ForegroundState, LifecycleHooks, Tracker, TrackerPhase, TransitionDeduplicator, Verdict,
    },
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Everything a host needs from the outside world.
#[derive(Clone)]
pub struct HostDeps {
    pub store: Arc<dyn SessionStore>,
    pub sampler: Arc<dyn LocationSampler>,
    pub classifier: Arc<dyn ClassifierRegistration>,
    pub settings: TrackerSettings,
}

pub enum HostCommand {
    /// Boot or app start.
    Initialize,
    Transitions(Vec<TransitionEvent>),
    ActivityUpdates(Vec<DetectedActivity>),
    /// Replies once every command sent before it has been handled.
    Sync(tokio::sync::oneshot::Sender<()>),
    Shutdown,
}

/// Owns the deduplicator, the tracker and the foreground flag for one
/// service lifetime.
pub struct TrackerHost {
    deps: HostDeps,
    writer: SessionWriter,
    foreground: ForegroundState,
    dedup: TransitionDeduplicator,
    tracker: Tracker,
    registered: bool,
    stopped: bool,
}

impl TrackerHost {
    /// Seeds the tracker label from the store and records the service start.
    pub async fn start(deps: HostDeps) -> Self {
        let writer = SessionWriter::spawn(deps.store.clone());
        let foreground = ForegroundState::new();
        let tracker = build_tracker(&deps, &writer, &foreground).await;
        tracker.record_milestone("Service created");
        log_info!(
            "Tracker host started with label {}",
            tracker.snapshot().current_activity_label
        );

        Self {
            dedup: TransitionDeduplicator::new(deps.settings.suppression_window()),
            deps,
            writer,
            foreground,
            tracker,
            registered: false,
            stopped: false,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn foreground(&self) -> &ForegroundState {
        &self.foreground
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Handles one command. Returns `false` once the host has shut down.
    pub async fn dispatch(&mut self, command: HostCommand) -> bool {
        match command {
            HostCommand::Initialize => self.initialize().await,
            HostCommand::Transitions(batch) => self.on_transitions(&batch, Utc::now()).await,
            HostCommand::ActivityUpdates(updates) => self.on_activity_updates(&updates),
            HostCommand::Sync(done) => {
                self.tracker.flush().await;
                let _ = done.send(());
            }
            HostCommand::Shutdown => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    /// Registers for transitions once per host, then briefly enters and
    /// leaves continuous mode unless a route is being recorded.
    pub async fn initialize(&mut self) {
        if self.registered {
            log_info!("Activity transitions already registered");
        } else {
            let requests = TransitionRequest::all();
            match self.deps.classifier.register(&requests).await {
                Ok(()) => {
                    self.registered = true;
                    log_info!("Registered for {} activity transitions", requests.len());
                }
                Err(err) => log_error!("Failed to register activity transitions: {err:?}"),
            }
        }

        self.foreground.enter_continuous_tracking();
        if self.tracker.snapshot().phase == TrackerPhase::Idle {
            self.foreground.may_exit_continuous_tracking();
        }
    }

    pub async fn on_transitions(&mut self, batch: &[TransitionEvent], now: DateTime<Utc>) {
        if self.stopped {
            log_warn!("Transition batch after shutdown discarded");
            return;
        }
        if !self.deps.settings.tracking_enabled {
            log_info!("Tracking disabled; dropping {} transition(s)", batch.len());
            return;
        }

        match self.dedup.filter(batch, now) {
            Verdict::Forward(events) => self.tracker.handle_batch(&events).await,
            Verdict::Suppressed(event) => {
                log_info!("Ignoring repeated transition {}", event.describe());
            }
            Verdict::Ignored => {}
        }
    }

    pub fn on_activity_updates(&self, updates: &[DetectedActivity]) {
        for update in updates {
            log_info!(
                "Detected activity {} ({}% confidence)",
                update.activity,
                update.confidence
            );
        }
    }

    /// Drops the current tracker and starts over Idle, as after a process
    /// restart. Open points are lost.
    pub async fn restart(&mut self) {
        self.tracker.shutdown().await;
        self.tracker.flush().await;
        self.tracker = build_tracker(&self.deps, &self.writer, &self.foreground).await;
        self.dedup = TransitionDeduplicator::new(self.deps.settings.suppression_window());
        self.stopped = false;
        log_info!("Tracker restarted");
    }

    pub async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.tracker.shutdown().await;
        self.tracker.record_milestone("Service destroyed");
        self.tracker.flush().await;
        log_info!("Tracker host stopped");
    }
}

async fn build_tracker(
    deps: &HostDeps,
    writer: &SessionWriter,
    foreground: &ForegroundState,
) -> Tracker {
    // drain pending writes so the seeded label is the latest one
    writer.flush().await;
    let label = match deps.store.current_activity_label().await {
        Ok(label) => label,
        Err(err) => {
            log_warn!("Could not read last activity label: {err:?}");
            DEFAULT_ACTIVITY_LABEL.to_string()
        }
    };

    Tracker::new(
        label,
        deps.sampler.clone(),
        writer.clone(),
        Arc::new(foreground.clone()),
    )
    .with_sampling_request(deps.settings.sampling)
}
