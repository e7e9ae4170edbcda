use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::db::{ActivityEvent, RouteSession};

use super::SessionStore;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

enum WriteCommand {
    ActivityEvent(ActivityEvent),
    RouteSession(RouteSession),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget front of a [`SessionStore`].
///
/// Writes are queued and applied one at a time by a background task, so the
/// caller never waits on storage and each stream keeps its insertion order.
/// A failed write is logged and dropped; there is no retry.
#[derive(Clone)]
pub struct SessionWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SessionWriter {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn SessionStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(store, rx));
        Self { tx }
    }

    pub fn append_event(&self, event: ActivityEvent) {
        self.enqueue(WriteCommand::ActivityEvent(event));
    }

    pub fn append_route(&self, session: RouteSession) {
        if session.is_empty() {
            log_debug!("dropping empty route session {}", session.id);
            return;
        }
        self.enqueue(WriteCommand::RouteSession(session));
    }

    /// Resolves once every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    fn enqueue(&self, command: WriteCommand) {
        if self.tx.send(command).is_err() {
            log_warn!("session writer stopped; write discarded");
        }
    }
}

async fn write_loop(store: Arc<dyn SessionStore>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::ActivityEvent(event) => {
                let description = event.description.clone();
                if let Err(err) = store.append_activity_event(event).await {
                    log_error!("Failed to store activity event '{description}': {err:?}");
                }
            }
            WriteCommand::RouteSession(session) => {
                let id = session.id.clone();
                let label = session.activity_label.clone();
                let points = session.points.len();
                match store.append_route_session(session).await {
                    Ok(()) => log_debug!("Route {id} saved for {label} ({points} points)"),
                    Err(err) => log_error!(
                        "Failed to store route {id} for {label}, {points} points lost: {err:?}"
                    ),
                }
            }
            WriteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    log_debug!("session writer shutting down");
}
