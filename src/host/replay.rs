//! Drives a host from JSON lines, one input per line:
//!
//! ```text
//! {"kind":"transitions","events":[{"activity":7,"transition":0}]}
//! {"kind":"location","latitude":54.69,"longitude":25.28}
//! {"kind":"shutdown"}
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    models::{ActivityKind, DetectedActivity, RoutePoint, TransitionEvent},
    sampler::FeedSampler,
};

use super::{handle::HostHandle, service::HostCommand};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RawTransition {
    pub activity: i32,
    pub transition: i32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RawActivity {
    pub activity: i32,
    pub confidence: u8,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReplayLine {
    Initialize,
    Transitions {
        events: Vec<RawTransition>,
    },
    Activities {
        activities: Vec<RawActivity>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    Shutdown,
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ReplayLine>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .with_context(|| format!("invalid replay line: {trimmed}"))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub lines: usize,
    pub skipped: usize,
    pub batches: usize,
    pub fixes_delivered: usize,
    pub fixes_dropped: usize,
}

/// Feeds every line to the host until EOF or a shutdown line.
pub async fn replay<R>(reader: R, host: &HostHandle, sampler: &FeedSampler) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read replay input")? {
        stats.lines += 1;
        let parsed = match parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(err) => {
                log_warn!("Skipping line {}: {err:#}", stats.lines);
                stats.skipped += 1;
                continue;
            }
        };

        match parsed {
            ReplayLine::Initialize => host.send(HostCommand::Initialize)?,
            ReplayLine::Transitions { events } => {
                let now = Utc::now();
                let batch = events
                    .iter()
                    .map(|raw| TransitionEvent::from_codes(raw.activity, raw.transition, now))
                    .collect();
                host.send(HostCommand::Transitions(batch))?;
                stats.batches += 1;
            }
            ReplayLine::Activities { activities } => {
                let updates = activities
                    .iter()
                    .map(|raw| DetectedActivity {
                        activity: ActivityKind::from_code(raw.activity),
                        confidence: raw.confidence,
                    })
                    .collect();
                host.send(HostCommand::ActivityUpdates(updates))?;
            }
            ReplayLine::Location {
                latitude,
                longitude,
                timestamp,
            } => {
                // fixes must land after the transitions queued before them
                host.sync().await?;
                let point =
                    RoutePoint::new(latitude, longitude, timestamp.unwrap_or_else(Utc::now));
                if sampler.deliver(point) {
                    stats.fixes_delivered += 1;
                } else {
                    log_debug!("No subscriber for fix on line {}", stats.lines);
                    stats.fixes_dropped += 1;
                }
            }
            ReplayLine::Shutdown => {
                log_info!("Shutdown requested on line {}", stats.lines);
                break;
            }
        }
    }

    host.sync().await?;
    Ok(stats)
}
