// SPDX-License-Identifier: MIT

//! Zone distribution storage.

use rusqlite::params;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::{SessionZones, Zone};

/// Zone data to save for one session, before it has database IDs.
#[derive(Debug, Clone)]
pub struct NewSessionZones {
    pub zone_type: String,
    pub score: Option<f64>,
    pub sensor_based: bool,
    pub custom_zones: bool,
    pub points: Option<f64>,
    pub zones: Vec<Zone>,
}

#[derive(Clone)]
pub struct ZoneRepo {
    pool: DbPool,
}

impl ZoneRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Save zone distributions for a session, replacing any previous data
    /// of the same zone type.
    pub async fn save_for_session(
        &self,
        session_id: i64,
        zones: Vec<NewSessionZones>,
    ) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let tx = conn.transaction()?;
            for entry in zones {
                tx.execute(
                    "DELETE FROM session_zones WHERE session_id = ? AND zone_type = ?",
                    params![session_id, entry.zone_type],
                )?;
                tx.execute(
                    "INSERT INTO session_zones \
                     (session_id, zone_type, score, sensor_based, custom_zones, points) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        session_id,
                        entry.zone_type,
                        entry.score,
                        entry.sensor_based,
                        entry.custom_zones,
                        entry.points
                    ],
                )?;
                let session_zones_id = tx.last_insert_rowid();
                for zone in &entry.zones {
                    tx.execute(
                        "INSERT INTO zones (session_zones_id, min, max, time) VALUES (?, ?, ?, ?)",
                        params![session_zones_id, zone.min, zone.max, zone.time],
                    )?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    pub async fn for_session(&self, session_id: i64) -> Result<Vec<SessionZones>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT id, session_id, zone_type, score, sensor_based, custom_zones, points \
                 FROM session_zones WHERE session_id = ? ORDER BY zone_type",
            )?;
            let mut result = stmt
                .query_map([session_id], |row| {
                    Ok(SessionZones {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        zone_type: row.get(2)?,
                        score: row.get(3)?,
                        sensor_based: row.get(4)?,
                        custom_zones: row.get(5)?,
                        points: row.get(6)?,
                        zones: Vec::new(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut zone_stmt = conn.prepare(
                "SELECT min, max, time FROM zones WHERE session_zones_id = ? ORDER BY id",
            )?;
            for entry in &mut result {
                entry.zones = zone_stmt
                    .query_map([entry.id], |row| {
                        Ok(Zone {
                            min: row.get(0)?,
                            max: row.get(1)?,
                            time: row.get(2)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
            }
            Ok(result)
        })
        .await?
    }
}
