//! Tracker-facing persistence seam.
//!
//! The tracker only appends and asks for the last known label; list and live
//! queries for UI readers live on [`Database`] directly.

pub mod writer;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::{ActivityEvent, Database, RouteSession};

pub use writer::SessionWriter;

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn append_activity_event(&self, event: ActivityEvent) -> Result<()>;

    /// Must not write anything for a session without points.
    async fn append_route_session(&self, session: RouteSession) -> Result<()>;

    async fn current_activity_label(&self) -> Result<String>;
}

#[async_trait]
impl SessionStore for Database {
    async fn append_activity_event(&self, event: ActivityEvent) -> Result<()> {
        self.insert_activity_event(&event).await.map(|_| ())
    }

    async fn append_route_session(&self, session: RouteSession) -> Result<()> {
        self.insert_route_session(&session).await.map(|_| ())
    }

    async fn current_activity_label(&self) -> Result<String> {
        Database::current_activity_label(self).await
    }
}
