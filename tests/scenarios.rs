use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use activity_tracker_lib::{
    classifier::RecordingRegistration,
    db::{Database, DEFAULT_ACTIVITY_LABEL},
    host::{replay, HostCommand, HostDeps, HostHandle, TrackerHost},
    models::{ActivityKind, RoutePoint, TransitionEvent, TransitionKind},
    sampler::FeedSampler,
    settings::TrackerSettings,
    tracker::TrackerPhase,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempfile::TempDir;

struct Rig {
    _dir: TempDir,
    db: Database,
    sampler: FeedSampler,
    registration: RecordingRegistration,
    host: TrackerHost,
}

async fn rig_with(settings: TrackerSettings) -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("tracker.sqlite3")).unwrap();
    let sampler = FeedSampler::new();
    let registration = RecordingRegistration::new();
    let host = TrackerHost::start(HostDeps {
        store: Arc::new(db.clone()),
        sampler: Arc::new(sampler.clone()),
        classifier: Arc::new(registration.clone()),
        settings,
    })
    .await;

    Rig {
        _dir: dir,
        db,
        sampler,
        registration,
        host,
    }
}

async fn rig() -> Rig {
    rig_with(TrackerSettings::default()).await
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 3, 7, 30, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(secs)
}

fn ev(activity: ActivityKind, transition: TransitionKind, secs: i64) -> TransitionEvent {
    TransitionEvent::new(activity, transition, at(secs))
}

fn fix(lat: f64, lon: f64, secs: i64) -> RoutePoint {
    RoutePoint::new(lat, lon, at(secs))
}

impl Rig {
    async fn send(&mut self, activity: ActivityKind, transition: TransitionKind, secs: i64) {
        self.host
            .on_transitions(&[ev(activity, transition, secs)], at(secs))
            .await;
    }

    async fn settle(&self) {
        self.host.tracker().flush().await;
    }
}

#[tokio::test]
async fn walking_enter_starts_sampling_without_a_route() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    rig.settle().await;

    let snap = rig.host.tracker().snapshot();
    assert_eq!(snap.phase, TrackerPhase::Sampling);
    assert_eq!(snap.current_activity_label, "Walking");
    assert!(rig.sampler.is_subscribed());
    assert!(rig.db.list_route_sessions().await.unwrap().is_empty());
    assert_eq!(rig.db.current_activity_label().await.unwrap(), "Walking");
}

#[tokio::test]
async fn walking_exit_persists_the_points() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    for (i, p) in [1.0, 1.1, 1.2].into_iter().enumerate() {
        assert!(rig.sampler.deliver(fix(p, p, i as i64 + 1)));
    }
    rig.send(ActivityKind::Walking, TransitionKind::Exit, 60).await;
    rig.settle().await;

    let routes = rig.db.list_route_sessions().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].activity_label, "Walking");
    assert_eq!(
        routes[0].points,
        vec![fix(1.0, 1.0, 1), fix(1.1, 1.1, 2), fix(1.2, 1.2, 3)]
    );
    assert_eq!(routes[0].opened_at, at(0));
    assert_eq!(routes[0].closed_at, at(60));
    assert!(!rig.sampler.is_subscribed());
    assert_eq!(rig.host.tracker().snapshot().phase, TrackerPhase::Idle);
}

#[tokio::test]
async fn activity_change_closes_the_previous_route_first() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    rig.sampler.deliver(fix(54.0, 25.0, 5));
    rig.send(ActivityKind::InVehicle, TransitionKind::Enter, 120).await;
    rig.sampler.deliver(fix(54.1, 25.1, 130));
    rig.settle().await;

    let routes = rig.db.list_route_sessions().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].activity_label, "Walking");
    assert_eq!(routes[0].points, vec![fix(54.0, 25.0, 5)]);

    let snap = rig.host.tracker().snapshot();
    assert_eq!(snap.current_activity_label, "InVehicle");
    assert_eq!(snap.open_point_count, 1);
    assert_eq!(snap.session_opened_at, Some(at(120)));
    // sampling carried over, no resubscribe
    assert_eq!(rig.sampler.subscriptions_opened(), 1);
}

#[tokio::test]
async fn still_enter_closes_route_and_releases_foreground() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    assert!(rig.host.foreground().is_in_foreground());
    rig.sampler.deliver(fix(1.0, 1.0, 1));
    rig.sampler.deliver(fix(1.1, 1.1, 2));

    rig.send(ActivityKind::Still, TransitionKind::Enter, 300).await;
    rig.settle().await;

    let routes = rig.db.list_route_sessions().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].activity_label, "Walking");
    assert_eq!(routes[0].points.len(), 2);
    assert!(!rig.sampler.is_subscribed());
    assert!(!rig.host.foreground().is_in_foreground());
    assert_eq!(rig.host.foreground().exit_count(), 1);
    assert_eq!(rig.host.tracker().snapshot().current_activity_label, "Still");
}

#[tokio::test]
async fn repeated_enter_inside_window_is_suppressed() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 30).await;
    rig.settle().await;

    let history = rig.db.list_activity_events().await.unwrap();
    let transitions: Vec<_> = history
        .iter()
        .filter(|e| e.activity_label.is_some())
        .map(|e| e.description.as_str())
        .collect();
    assert_eq!(transitions, ["Walking - Enter"]);
    assert_eq!(rig.sampler.subscriptions_opened(), 1);
    assert_eq!(rig.host.tracker().snapshot().phase, TrackerPhase::Sampling);

    // outside the window the same transition goes through again
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 601).await;
    rig.settle().await;
    assert_eq!(
        rig.db
            .list_activity_events()
            .await
            .unwrap()
            .iter()
            .filter(|e| e.description == "Walking - Enter")
            .count(),
        2
    );
}

#[tokio::test]
async fn label_follows_every_accepted_transition() {
    let mut rig = rig().await;
    assert_eq!(
        rig.host.tracker().snapshot().current_activity_label,
        DEFAULT_ACTIVITY_LABEL
    );

    let steps = [
        (ActivityKind::Running, TransitionKind::Enter),
        (ActivityKind::Still, TransitionKind::Exit),
        (ActivityKind::Cycling, TransitionKind::Exit),
        (ActivityKind::OnFoot, TransitionKind::Enter),
    ];
    for (i, (activity, transition)) in steps.into_iter().enumerate() {
        rig.send(activity, transition, i as i64 * 10).await;
        assert_eq!(
            rig.host.tracker().snapshot().current_activity_label,
            activity.as_str()
        );
    }
}

#[tokio::test]
async fn label_is_seeded_from_history_on_start() {
    let mut first = rig().await;
    first.send(ActivityKind::Cycling, TransitionKind::Enter, 0).await;
    first.host.shutdown().await;

    let host = TrackerHost::start(HostDeps {
        store: Arc::new(first.db.clone()),
        sampler: Arc::new(FeedSampler::new()),
        classifier: Arc::new(RecordingRegistration::new()),
        settings: TrackerSettings::default(),
    })
    .await;

    let snap = host.tracker().snapshot();
    assert_eq!(snap.current_activity_label, "Cycling");
    assert_eq!(snap.phase, TrackerPhase::Idle);
}

#[tokio::test]
async fn milestones_bracket_the_service_lifetime() {
    let mut rig = rig().await;
    // history is ordered by wall clock, like the milestones
    let now = Utc::now();
    rig.host
        .on_transitions(
            &[TransitionEvent::new(
                ActivityKind::Walking,
                TransitionKind::Enter,
                now,
            )],
            now,
        )
        .await;
    rig.sampler.deliver(RoutePoint::new(1.0, 1.0, now));
    rig.host.shutdown().await;
    rig.host.shutdown().await;

    let mut history = rig.db.list_activity_events().await.unwrap();
    history.reverse();
    let descriptions: Vec<_> = history.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(
        descriptions,
        ["Service created", "Walking - Enter", "Service destroyed"]
    );
    // open route dies with the service
    assert!(rig.db.list_route_sessions().await.unwrap().is_empty());
    assert!(!rig.sampler.is_subscribed());
}

#[tokio::test]
async fn classifier_is_registered_once() {
    let mut rig = rig().await;
    rig.host.initialize().await;
    rig.host.initialize().await;

    assert!(rig.host.is_registered());
    assert_eq!(rig.registration.calls(), 1);
    assert_eq!(rig.registration.last_requests().len(), 12);
    assert!(!rig.host.foreground().is_in_foreground());
}

#[tokio::test]
async fn disabled_tracking_drops_batches() {
    let mut rig = rig_with(TrackerSettings {
        tracking_enabled: false,
        ..TrackerSettings::default()
    })
    .await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    rig.settle().await;

    assert_eq!(rig.host.tracker().snapshot().phase, TrackerPhase::Idle);
    assert!(!rig.sampler.is_subscribed());
    assert_eq!(
        rig.db.current_activity_label().await.unwrap(),
        DEFAULT_ACTIVITY_LABEL
    );
}

#[tokio::test]
async fn restart_comes_back_idle() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Running, TransitionKind::Enter, 0).await;
    rig.sampler.deliver(fix(2.0, 2.0, 1));

    rig.host.restart().await;

    let snap = rig.host.tracker().snapshot();
    assert_eq!(snap.phase, TrackerPhase::Idle);
    assert_eq!(snap.open_point_count, 0);
    assert_eq!(snap.current_activity_label, "Running");
    assert!(!rig.sampler.is_subscribed());

    // the same enter is not suppressed after a restart
    rig.send(ActivityKind::Running, TransitionKind::Enter, 10).await;
    assert!(rig.sampler.is_subscribed());
}

#[tokio::test]
async fn replayed_trace_produces_routes() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("tracker.sqlite3")).unwrap();
    let sampler = FeedSampler::new();
    let host = TrackerHost::start(HostDeps {
        store: Arc::new(db.clone()),
        sampler: Arc::new(sampler.clone()),
        classifier: Arc::new(RecordingRegistration::new()),
        settings: TrackerSettings::default(),
    })
    .await;
    let handle = HostHandle::spawn(host);
    handle.send(HostCommand::Initialize).unwrap();

    let trace = br#"
# morning walk
{"kind":"location","latitude":0.0,"longitude":0.0}
{"kind":"transitions","events":[{"activity":7,"transition":0}]}
{"kind":"location","latitude":54.1,"longitude":25.1}
{"kind":"location","latitude":54.2,"longitude":25.2}
{"kind":"activities","activities":[{"activity":7,"confidence":90}]}
not json
{"kind":"transitions","events":[{"activity":7,"transition":1},{"activity":3,"transition":0}]}
{"kind":"shutdown"}
{"kind":"location","latitude":9.9,"longitude":9.9}
"#;

    let stats = replay(&trace[..], &handle, &sampler).await.unwrap();
    handle.stop().await.unwrap();

    assert_eq!(stats.batches, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.fixes_delivered, 2);
    assert_eq!(stats.fixes_dropped, 1);

    let routes = db.list_route_summaries().await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].activity_label, "Walking");
    assert_eq!(routes[0].point_count, 2);
    assert_eq!(db.current_activity_label().await.unwrap(), "Still");
}

#[tokio::test]
async fn aborted_host_still_records_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("tracker.sqlite3")).unwrap();
    let sampler = FeedSampler::new();
    let host = TrackerHost::start(HostDeps {
        store: Arc::new(db.clone()),
        sampler: Arc::new(sampler.clone()),
        classifier: Arc::new(RecordingRegistration::new()),
        settings: TrackerSettings::default(),
    })
    .await;
    let handle = HostHandle::spawn(host);
    handle
        .send(HostCommand::Transitions(vec![TransitionEvent::new(
            ActivityKind::Running,
            TransitionKind::Enter,
            Utc::now(),
        )]))
        .unwrap();
    handle.sync().await.unwrap();
    assert!(sampler.is_subscribed());

    handle.abort().await.unwrap();

    assert!(!sampler.is_subscribed());
    let history = db.list_activity_events().await.unwrap();
    assert_eq!(history[0].description, "Service destroyed");
}

async fn wait_for(counter: &AtomicUsize, at_least: usize) {
    while counter.load(Ordering::SeqCst) < at_least {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fixes_racing_transitions_land_in_exactly_one_route() {
    let mut rig = rig().await;
    rig.send(ActivityKind::Walking, TransitionKind::Enter, 0).await;
    assert!(rig.sampler.is_subscribed());

    let stop = Arc::new(AtomicBool::new(false));
    let accepted = Arc::new(AtomicUsize::new(0));
    let pusher = {
        let sampler = rig.sampler.clone();
        let stop = stop.clone();
        let accepted = accepted.clone();
        std::thread::spawn(move || {
            // fix n carries n as its latitude; numbering only advances while
            // someone is subscribed
            let mut next = 0usize;
            while !stop.load(Ordering::SeqCst) {
                if sampler.deliver(fix(next as f64, 0.0, next as i64)) {
                    next += 1;
                    accepted.store(next, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_micros(50));
            }
            next
        })
    };

    wait_for(&accepted, 20).await;
    rig.send(ActivityKind::InVehicle, TransitionKind::Enter, 100).await;
    let switched = accepted.load(Ordering::SeqCst);
    wait_for(&accepted, switched + 20).await;
    let before_exit = accepted.load(Ordering::SeqCst);
    rig.send(ActivityKind::InVehicle, TransitionKind::Exit, 200).await;

    stop.store(true, Ordering::SeqCst);
    let pushed = pusher.join().unwrap();
    rig.settle().await;

    let mut routes = rig.db.list_route_sessions().await.unwrap();
    routes.reverse();
    let labels: Vec<_> = routes.iter().map(|r| r.activity_label.as_str()).collect();
    assert_eq!(labels, ["Walking", "InVehicle"]);
    assert!(routes.iter().all(|r| !r.points.is_empty()));

    let kept: Vec<usize> = routes
        .iter()
        .flat_map(|r| r.points.iter().map(|p| p.latitude as usize))
        .collect();
    // no duplicates, no gaps, arrival order kept across the split
    assert_eq!(kept, (0..kept.len()).collect::<Vec<_>>());
    assert!(kept.len() >= before_exit);
    assert!(kept.len() <= pushed);
    assert_eq!(rig.host.tracker().snapshot().open_point_count, 0);
}
