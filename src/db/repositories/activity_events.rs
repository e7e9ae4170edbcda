use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::{Database, StoreTable},
    helpers::parse_datetime,
    live::LiveQuery,
    models::{ActivityEvent, DEFAULT_ACTIVITY_LABEL},
};

fn row_to_activity_event(row: &Row) -> Result<ActivityEvent> {
    let timestamp: String = row.get("timestamp")?;

    Ok(ActivityEvent {
        id: row.get("id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        description: row.get("description")?,
        activity_label: row.get("activity_label")?,
    })
}

impl Database {
    /// Appends one history entry and returns its row id.
    pub async fn insert_activity_event(&self, event: &ActivityEvent) -> Result<i64> {
        let record = event.clone();
        let id = self
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO activity_events (timestamp, description, activity_label)
                     VALUES (?1, ?2, ?3)",
                    params![
                        record.timestamp.to_rfc3339(),
                        record.description,
                        record.activity_label,
                    ],
                )
                .with_context(|| "failed to insert activity event")?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        self.notify_changed(StoreTable::ActivityEvents);
        Ok(id)
    }

    /// Full history, newest first. Ties on timestamp fall back to insertion
    /// order so same-instant entries keep their relative order.
    pub async fn list_activity_events(&self) -> Result<Vec<ActivityEvent>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, description, activity_label
                 FROM activity_events
                 ORDER BY timestamp DESC, id DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_activity_event(row)?);
            }

            Ok(events)
        })
        .await
    }

    /// Label of the latest entry that carries one, or the default label.
    pub async fn current_activity_label(&self) -> Result<String> {
        self.execute(|conn| {
            let label: Option<String> = conn
                .query_row(
                    "SELECT activity_label FROM activity_events
                     WHERE activity_label IS NOT NULL
                     ORDER BY timestamp DESC, id DESC
                     LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(label.unwrap_or_else(|| DEFAULT_ACTIVITY_LABEL.to_string()))
        })
        .await
    }

    pub fn watch_history(&self) -> LiveQuery<ActivityEvent> {
        LiveQuery::new(self.clone(), StoreTable::ActivityEvents, |db| async move {
            db.list_activity_events().await
        })
    }
}
