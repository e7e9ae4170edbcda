use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        connection::{Database, StoreTable},
        helpers::{parse_datetime, to_i64, to_u64},
        live::LiveQuery,
        models::{RouteSession, RouteSummary},
    },
    models::RoutePoint,
};

const SESSION_COLUMNS: &str = "id, activity_label, opened_at, closed_at";

fn row_to_session_header(row: &Row) -> Result<RouteSession> {
    let opened_at: String = row.get("opened_at")?;
    let closed_at: String = row.get("closed_at")?;

    Ok(RouteSession {
        id: row.get("id")?,
        activity_label: row.get("activity_label")?,
        opened_at: parse_datetime(&opened_at, "opened_at")?,
        closed_at: parse_datetime(&closed_at, "closed_at")?,
        points: Vec::new(),
    })
}

fn row_to_point(row: &Row) -> Result<RoutePoint> {
    let timestamp: String = row.get("timestamp")?;

    Ok(RoutePoint {
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
    })
}

fn load_points(conn: &Connection, session_id: &str) -> Result<Vec<RoutePoint>> {
    let mut stmt = conn.prepare_cached(
        "SELECT latitude, longitude, timestamp
         FROM route_points
         WHERE session_id = ?1
         ORDER BY seq ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut points = Vec::new();
    while let Some(row) = rows.next()? {
        points.push(row_to_point(row)?);
    }
    Ok(points)
}

impl Database {
    /// Persists a closed session with its points in one transaction.
    /// Returns `false` without touching the database when there are no points.
    pub async fn insert_route_session(&self, session: &RouteSession) -> Result<bool> {
        if session.is_empty() {
            return Ok(false);
        }

        let record = session.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO route_sessions (id, activity_label, opened_at, closed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id,
                    record.activity_label,
                    record.opened_at.to_rfc3339(),
                    record.closed_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert route session")?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO route_points (session_id, seq, latitude, longitude, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for (seq, point) in record.points.iter().enumerate() {
                    stmt.execute(params![
                        record.id,
                        to_i64(seq)?,
                        point.latitude,
                        point.longitude,
                        point.timestamp.to_rfc3339(),
                    ])
                    .with_context(|| format!("failed to insert route point {seq}"))?;
                }
            }

            tx.commit().context("failed to commit route session")?;
            Ok(())
        })
        .await?;

        self.notify_changed(StoreTable::RouteSessions);
        Ok(true)
    }

    pub async fn get_route_session(&self, session_id: &str) -> Result<Option<RouteSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let header = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM route_sessions WHERE id = ?1"),
                    params![session_id],
                    |row| Ok(row_to_session_header(row)),
                )
                .optional()?
                .transpose()?;

            match header {
                Some(mut session) => {
                    session.points = load_points(conn, &session.id)?;
                    Ok(Some(session))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Every session with its points, most recently closed first.
    pub async fn list_route_sessions(&self) -> Result<Vec<RouteSession>> {
        self.execute(|conn| {
            let mut sessions = Vec::new();
            {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM route_sessions
                     ORDER BY closed_at DESC, rowid DESC"
                ))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    sessions.push(row_to_session_header(row)?);
                }
            }

            for session in sessions.iter_mut() {
                session.points = load_points(conn, &session.id)?;
            }

            Ok(sessions)
        })
        .await
    }

    pub async fn list_route_summaries(&self) -> Result<Vec<RouteSummary>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id AS id, s.activity_label AS activity_label,
                        s.opened_at AS opened_at, s.closed_at AS closed_at,
                        COUNT(p.id) AS point_count
                 FROM route_sessions s
                 LEFT JOIN route_points p ON p.session_id = s.id
                 GROUP BY s.id
                 ORDER BY s.closed_at DESC, s.rowid DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut summaries = Vec::new();
            while let Some(row) = rows.next()? {
                let header = row_to_session_header(row)?;
                let point_count: i64 = row.get("point_count")?;
                summaries.push(RouteSummary {
                    id: header.id,
                    activity_label: header.activity_label,
                    opened_at: header.opened_at,
                    closed_at: header.closed_at,
                    point_count: to_u64(point_count, "point_count")?,
                });
            }
            Ok(summaries)
        })
        .await
    }

    /// Deletes a session; its points go with it via ON DELETE CASCADE.
    pub async fn delete_route_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM route_sessions WHERE id = ?1",
                params![session_id],
            )?;

            if rows_affected == 0 {
                bail!("route session {session_id} not found");
            }
            Ok(())
        })
        .await?;

        self.notify_changed(StoreTable::RouteSessions);
        Ok(())
    }

    pub fn watch_routes(&self) -> LiveQuery<RouteSession> {
        LiveQuery::new(self.clone(), StoreTable::RouteSessions, |db| async move {
            db.list_route_sessions().await
        })
    }
}
