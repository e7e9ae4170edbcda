pub mod classifier;
pub mod db;
pub mod host;
pub mod models;
pub mod sampler;
pub mod settings;
pub mod store;
pub mod tracker;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use classifier::RecordingRegistration;
use db::Database;
use host::{HostCommand, HostDeps, HostHandle, TrackerHost};
use sampler::FeedSampler;
use settings::SettingsStore;
use tokio::io::BufReader;

pub const DATA_DIR_ENV: &str = "ACTIVITY_TRACKER_DATA_DIR";
pub const DEBUG_ENV: &str = "ACTIVITY_TRACKER_DEBUG";

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".activity-tracker"))
}

/// Level applied when `RUST_LOG` does not set one.
fn default_log_level(rust_log_set: bool, debug: bool) -> Option<log::LevelFilter> {
    if rust_log_set {
        None
    } else if debug {
        Some(log::LevelFilter::Debug)
    } else {
        Some(log::LevelFilter::Info)
    }
}

/// Replays JSON-line input from stdin through a tracker backed by SQLite.
pub fn run() -> Result<()> {
    // Initialize logging (RUST_LOG wins over the built-in default)
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = default_log_level(
        std::env::var_os("RUST_LOG").is_some(),
        std::env::var_os(DEBUG_ENV).is_some(),
    ) {
        builder.filter_level(level);
    }
    builder.init();

    log::info!("Activity tracker starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(replay_stdin())
}

async fn replay_stdin() -> Result<()> {
    let app_data_dir = data_dir();
    std::fs::create_dir_all(&app_data_dir)
        .with_context(|| format!("failed to create {}", app_data_dir.display()))?;

    let database = Database::new(app_data_dir.join("activity_tracker.sqlite3"))?;
    log::info!("Replaying into {}", database.path().display());
    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
    let sampler = FeedSampler::new();

    let host = TrackerHost::start(HostDeps {
        store: Arc::new(database.clone()),
        sampler: Arc::new(sampler.clone()),
        classifier: Arc::new(RecordingRegistration::new()),
        settings: settings_store.tracker(),
    })
    .await;
    let handle = HostHandle::spawn(host);
    handle.send(HostCommand::Initialize)?;

    let stats = host::replay(BufReader::new(tokio::io::stdin()), &handle, &sampler).await?;
    handle.stop().await?;

    let routes = database.list_route_summaries().await?;
    log::info!(
        "Replayed {} lines ({} skipped, {} batches, {} fixes kept, {} dropped); {} routes stored",
        stats.lines,
        stats.skipped,
        stats.batches,
        stats.fixes_delivered,
        stats.fixes_dropped,
        routes.len()
    );
    for route in routes {
        println!(
            "{}",
            serde_json::to_string(&route).context("failed to serialize route summary")?
        );
    }
    Ok(())
}
