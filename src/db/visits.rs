// SPDX-License-Identifier: MIT

//! First-visit records per user and municipality.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::MunicipalityVisit;

/// A visit joined with its user and session, as consumed by the map page.
#[derive(Debug, Clone)]
pub struct VisitRow {
    pub municipality: String,
    pub username: String,
    pub discipline: String,
    pub date: NaiveDate,
}

#[derive(Clone)]
pub struct VisitRepo {
    pool: DbPool,
}

impl VisitRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record a visit. Later routes through an already visited municipality
    /// are ignored, so only the first visit is kept.
    pub async fn record(
        &self,
        user_id: i64,
        municipality: &str,
        session_id: i64,
        visited_on: DateTime<Utc>,
    ) -> Result<bool> {
        let pool = self.pool.clone();
        let municipality = municipality.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO municipality_visits \
                 (user_id, municipality, session_id, visited_on) VALUES (?, ?, ?, ?)",
                params![user_id, municipality, session_id, visited_on],
            )?;
            Ok(inserted > 0)
        })
        .await?
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<MunicipalityVisit>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT id, user_id, municipality, session_id, visited_on \
                 FROM municipality_visits WHERE user_id = ? ORDER BY visited_on",
            )?;
            let visits = stmt
                .query_map([user_id], |row| {
                    Ok(MunicipalityVisit {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        municipality: row.get(2)?,
                        session_id: row.get(3)?,
                        visited_on: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(visits)
        })
        .await?
    }

    /// Names of all municipalities a user has ever touched.
    pub async fn visited_names(&self, user_id: i64) -> Result<HashSet<String>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn
                .prepare("SELECT municipality FROM municipality_visits WHERE user_id = ?")?;
            let names = stmt
                .query_map([user_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            Ok(names)
        })
        .await?
    }

    /// All visits joined with user and session details. The map page
    /// filters these by user, discipline and date range.
    pub async fn visit_rows(&self) -> Result<Vec<VisitRow>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT v.municipality, u.username, d.name, s.date \
                 FROM municipality_visits v \
                 JOIN users u ON u.id = v.user_id \
                 JOIN training_sessions s ON s.id = v.session_id \
                 JOIN disciplines d ON d.id = s.discipline_id \
                 ORDER BY v.municipality, u.username",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(VisitRow {
                        municipality: row.get(0)?,
                        username: row.get(1)?,
                        discipline: row.get(2)?,
                        date: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await?
    }
}
