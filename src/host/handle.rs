use anyhow::{anyhow, Context, Result};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::service::{HostCommand, TrackerHost};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Sending side of a host running on its own task. Commands are handled one
/// at a time in the order they were sent.
pub struct HostHandle {
    tx: mpsc::UnboundedSender<HostCommand>,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl HostHandle {
    pub fn spawn(host: TrackerHost) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(dispatch_loop(host, rx, cancel_token.clone()));

        Self {
            tx,
            cancel_token,
            handle,
        }
    }

    pub fn send(&self, command: HostCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("tracker host is no longer running"))
    }

    /// Waits until every command sent so far was handled and its writes
    /// reached the store.
    pub async fn sync(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(HostCommand::Sync(done_tx))?;
        done_rx
            .await
            .context("tracker host stopped before syncing")
    }

    /// Stops the host after the commands already queued.
    pub async fn stop(self) -> Result<()> {
        // the loop may already be gone after an explicit Shutdown
        let _ = self.tx.send(HostCommand::Shutdown);
        self.handle
            .await
            .context("tracker host task failed to join")
    }

    /// Stops the host without draining queued commands.
    pub async fn abort(self) -> Result<()> {
        self.cancel_token.cancel();
        self.handle
            .await
            .context("tracker host task failed to join")
    }
}

async fn dispatch_loop(
    mut host: TrackerHost,
    mut rx: mpsc::UnboundedReceiver<HostCommand>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log_info!("Tracker host cancelled");
                host.shutdown().await;
                break;
            }
            command = rx.recv() => {
                let Some(command) = command else {
                    log_debug!("All host handles dropped");
                    host.shutdown().await;
                    break;
                };
                if !host.dispatch(command).await {
                    break;
                }
            }
        }
    }
}
