//! Continuously-updated query results for UI readers.
//!
//! A `LiveQuery` yields the full current list once, then again after every
//! write to its table. Bursts of writes between two `next()` calls collapse
//! into a single re-read, so readers always see the latest state rather than
//! every intermediate one.

use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Result;
use tokio::sync::watch;

use super::connection::{Database, StoreTable};

type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<Vec<T>>> + Send>>;
type FetchFn<T> = Arc<dyn Fn(Database) -> FetchFuture<T> + Send + Sync>;

pub struct LiveQuery<T> {
    db: Database,
    changes: watch::Receiver<u64>,
    fetch: FetchFn<T>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    pub(crate) fn new<F, Fut>(db: Database, table: StoreTable, fetch: F) -> Self
    where
        F: Fn(Database) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let changes = db.subscribe_changes(table);
        Self {
            db,
            changes,
            fetch: Arc::new(move |db| Box::pin(fetch(db))),
            primed: false,
        }
    }

    /// Waits for the next snapshot. The first call returns immediately.
    /// Returns `None` once the store can no longer report changes.
    pub async fn next(&mut self) -> Option<Result<Vec<T>>> {
        if self.primed {
            if self.changes.changed().await.is_err() {
                return None;
            }
        } else {
            self.primed = true;
        }
        self.changes.borrow_and_update();
        Some((self.fetch)(self.db.clone()).await)
    }
}
