// SPDX-License-Identifier: MIT

//! Training session storage and the flattened rows used by stats and graphs.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::DbPool;
use crate::error::Result;
use crate::models::{Discipline, SessionStatRow, TrainingSession, TrainingType};

const SESSION_COLUMNS: &str = "id, user_id, discipline_id, date, start_date, moving_duration, \
     total_duration, distance, training_type_id, notes, date_added, average_hr, max_hr, \
     average_speed, max_speed, strava_updated, strava_id, polyline, summary_polyline";

fn map_session(row: &Row<'_>) -> rusqlite::Result<TrainingSession> {
    Ok(TrainingSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        discipline_id: row.get(2)?,
        date: row.get(3)?,
        start_date: row.get(4)?,
        moving_duration: row.get(5)?,
        total_duration: row.get(6)?,
        distance: row.get(7)?,
        training_type_id: row.get(8)?,
        notes: row.get(9)?,
        date_added: row.get(10)?,
        average_hr: row.get(11)?,
        max_hr: row.get(12)?,
        average_speed: row.get(13)?,
        max_speed: row.get(14)?,
        strava_updated: row.get(15)?,
        strava_id: row.get(16)?,
        polyline: row.get(17)?,
        summary_polyline: row.get(18)?,
    })
}

/// Fields for inserting or updating a session. `id` and `date_added` are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub discipline_id: i64,
    pub date: NaiveDate,
    pub start_date: Option<DateTime<Utc>>,
    pub moving_duration: Option<i64>,
    pub total_duration: Option<i64>,
    pub distance: Option<f64>,
    pub training_type_id: Option<i64>,
    pub notes: String,
    pub average_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub strava_updated: Option<DateTime<Utc>>,
    pub strava_id: Option<i64>,
    pub polyline: Option<String>,
    pub summary_polyline: Option<String>,
}

#[derive(Clone)]
pub struct SessionRepo {
    pool: DbPool,
}

impl SessionRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: NewSession) -> Result<TrainingSession> {
        let pool = self.pool.clone();
        let now = Utc::now();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO training_sessions (user_id, discipline_id, date, start_date, \
                 moving_duration, total_duration, distance, training_type_id, notes, date_added, \
                 average_hr, max_hr, average_speed, max_speed, strava_updated, strava_id, \
                 polyline, summary_polyline) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    session.user_id,
                    session.discipline_id,
                    session.date,
                    session.start_date,
                    session.moving_duration,
                    session.total_duration,
                    session.distance,
                    session.training_type_id,
                    session.notes,
                    now,
                    session.average_hr,
                    session.max_hr,
                    session.average_speed,
                    session.max_speed,
                    session.strava_updated,
                    session.strava_id,
                    session.polyline,
                    session.summary_polyline,
                ],
            )?;
            let id = conn.last_insert_rowid();
            let created = conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = ?"),
                [id],
                map_session,
            )?;
            Ok(created)
        })
        .await?
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<TrainingSession>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM training_sessions WHERE id = ?"),
                    [id],
                    map_session,
                )
                .optional()?;
            Ok(session)
        })
        .await?
    }

    pub async fn find_by_strava_id(&self, strava_id: i64) -> Result<Option<TrainingSession>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM training_sessions WHERE strava_id = ?"),
                    [strava_id],
                    map_session,
                )
                .optional()?;
            Ok(session)
        })
        .await?
    }

    /// All sessions for one user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<TrainingSession>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM training_sessions WHERE user_id = ? \
                 ORDER BY date DESC, start_date DESC"
            ))?;
            let sessions = stmt
                .query_map([user_id], map_session)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
        .await?
    }

    pub async fn update_start_date(&self, id: i64, start_date: DateTime<Utc>) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE training_sessions SET start_date = ? WHERE id = ?",
                params![start_date, id],
            )?;
            Ok(())
        })
        .await?
    }

    /// Sessions that came from Strava but have no exact start time yet.
    pub async fn list_missing_start_date(&self, user_id: i64) -> Result<Vec<TrainingSession>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM training_sessions \
                 WHERE user_id = ? AND strava_id IS NOT NULL AND start_date IS NULL"
            ))?;
            let sessions = stmt
                .query_map([user_id], map_session)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
        .await?
    }

    /// Flattened rows joined with user and discipline names, for stats and
    /// graphs. `since` limits rows to sessions on or after that date.
    pub async fn stat_rows(&self, since: Option<NaiveDate>) -> Result<Vec<SessionStatRow>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let sql = "SELECT u.username, d.name, s.date, s.start_date, s.moving_duration, \
                       s.total_duration, s.distance \
                       FROM training_sessions s \
                       JOIN users u ON u.id = s.user_id \
                       JOIN disciplines d ON d.id = s.discipline_id \
                       WHERE (?1 IS NULL OR s.date >= ?1) \
                       ORDER BY s.date, s.start_date";
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(params![since], |row| {
                    Ok(SessionStatRow {
                        username: row.get(0)?,
                        discipline: row.get(1)?,
                        date: row.get(2)?,
                        start_date: row.get(3)?,
                        moving_duration: row.get(4)?,
                        total_duration: row.get(5)?,
                        distance: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }

    /// Backfill the summary polyline of a session from an archived payload.
    pub async fn update_summary_polyline(&self, id: i64, summary_polyline: &str) -> Result<()> {
        let pool = self.pool.clone();
        let summary_polyline = summary_polyline.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE training_sessions SET summary_polyline = ? WHERE id = ?",
                params![summary_polyline, id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn find_discipline_by_name(&self, name: &str) -> Result<Option<Discipline>> {
        let pool = self.pool.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let discipline = conn
                .query_row(
                    "SELECT id, name FROM disciplines WHERE name = ? COLLATE NOCASE",
                    [&name],
                    |row| {
                        Ok(Discipline {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(discipline)
        })
        .await?
    }

    pub async fn list_disciplines(&self) -> Result<Vec<Discipline>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare("SELECT id, name FROM disciplines ORDER BY id")?;
            let disciplines = stmt
                .query_map([], |row| {
                    Ok(Discipline {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(disciplines)
        })
        .await?
    }

    pub async fn get_or_create_training_type(&self, name: &str) -> Result<TrainingType> {
        let pool = self.pool.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT OR IGNORE INTO training_types (name) VALUES (?)",
                [&name],
            )?;
            let training_type = conn.query_row(
                "SELECT id, name FROM training_types WHERE name = ?",
                [&name],
                |row| {
                    Ok(TrainingType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )?;
            Ok(training_type)
        })
        .await?
    }
}
