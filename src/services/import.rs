// SPDX-License-Identifier: MIT

//! Strava activity import pipeline.
//!
//! Every imported object is archived as raw JSON before parsing, so
//! imports can be replayed after schema or mapping changes.

use serde::Serialize;

use crate::db::sessions::NewSession;
use crate::db::zones::NewSessionZones;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{StravaActivityImport, TrainingSession, Zone};
use crate::services::region::RegionService;
use crate::services::strava::{StravaActivity, StravaService};

/// Outcome of importing a single activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ImportOutcome {
    /// A new session was created
    Imported { session_id: i64 },
    /// A session with this Strava ID already exists
    AlreadyImported,
    /// The sport type has no discipline assigned yet
    UnmappedType { sport_type: String },
}

/// Summary of a batch import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: u32,
    pub already_imported: u32,
    /// Sport types that were seen but have no discipline mapping
    pub unmapped_types: Vec<String>,
    /// True when the run stopped early to preserve rate limit headroom
    pub rate_limited: bool,
}

/// Parse a raw Strava activity payload into our typed form.
pub fn parse_activity(value: &serde_json::Value) -> Result<StravaActivity> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::BadRequest(format!("Unparseable activity payload: {e}")))
}

/// Orchestrates fetching activities from Strava and turning them into
/// training sessions, zone records and municipality visits.
#[derive(Clone)]
pub struct ImportService {
    db: Database,
    strava: StravaService,
    regions: RegionService,
}

impl ImportService {
    pub fn new(db: Database, strava: StravaService, regions: RegionService) -> Self {
        Self {
            db,
            strava,
            regions,
        }
    }

    /// Import one activity from its raw payload.
    pub async fn import_activity(
        &self,
        user_id: i64,
        payload: &serde_json::Value,
    ) -> Result<ImportOutcome> {
        let activity = parse_activity(payload)?;

        // Archive first, even when nothing else happens
        self.db
            .strava
            .save_raw_import(activity.id, StravaActivityImport::ACTIVITY, payload)
            .await?;

        if self
            .db
            .sessions
            .find_by_strava_id(activity.id)
            .await?
            .is_some()
        {
            tracing::debug!(strava_id = activity.id, "Activity already imported");
            return Ok(ImportOutcome::AlreadyImported);
        }

        let mapping = self
            .db
            .strava
            .get_or_insert_mapping(&activity.sport_type)
            .await?;
        let Some(discipline_id) = mapping.discipline_id else {
            tracing::info!(
                sport_type = %activity.sport_type,
                strava_id = activity.id,
                "No discipline mapped for sport type, skipping session"
            );
            return Ok(ImportOutcome::UnmappedType {
                sport_type: activity.sport_type,
            });
        };

        let session = self
            .db
            .sessions
            .create(Self::session_from_activity(user_id, discipline_id, &activity))
            .await?;

        self.import_zones(user_id, &session).await?;
        self.record_visits(&session).await?;

        tracing::info!(
            user_id,
            strava_id = activity.id,
            session_id = session.id,
            "Activity imported"
        );

        Ok(ImportOutcome::Imported {
            session_id: session.id,
        })
    }

    fn session_from_activity(
        user_id: i64,
        discipline_id: i64,
        activity: &StravaActivity,
    ) -> NewSession {
        NewSession {
            user_id,
            discipline_id,
            date: activity.start_date.date_naive(),
            start_date: Some(activity.start_date),
            moving_duration: activity.moving_time,
            total_duration: activity.elapsed_time,
            distance: activity.distance,
            training_type_id: None,
            notes: activity.name.clone().unwrap_or_default(),
            average_hr: activity.average_heartrate,
            max_hr: activity.max_heartrate,
            average_speed: activity.average_speed,
            max_speed: activity.max_speed,
            strava_updated: Some(chrono::Utc::now()),
            strava_id: Some(activity.id),
            polyline: activity
                .map
                .as_ref()
                .and_then(|m| m.polyline.clone()),
            summary_polyline: activity
                .map
                .as_ref()
                .and_then(|m| m.summary_polyline.clone()),
        }
    }

    /// Fetch and store zone distributions. Zones are only available for
    /// premium athletes, so others are skipped without an API call.
    async fn import_zones(&self, user_id: i64, session: &TrainingSession) -> Result<()> {
        let Some(athlete) = self.db.strava.get_athlete(user_id).await? else {
            return Ok(());
        };
        if !athlete.premium {
            return Ok(());
        }
        let Some(strava_id) = session.strava_id else {
            return Ok(());
        };

        let zones = match self.strava.get_activity_zones(user_id, strava_id).await {
            Ok(zones) => zones,
            Err(e) => {
                // Zones are best-effort; a failure here should not undo
                // the session import
                tracing::warn!(error = %e, strava_id, "Failed to fetch activity zones");
                return Ok(());
            }
        };

        let raw = serde_json::to_value(
            zones
                .iter()
                .map(|z| {
                    serde_json::json!({
                        "type": z.zone_type,
                        "score": z.score,
                        "sensor_based": z.sensor_based,
                        "custom_zones": z.custom_zones,
                        "points": z.points,
                        "distribution_buckets": z
                            .distribution_buckets
                            .iter()
                            .map(|b| serde_json::json!({"min": b.min, "max": b.max, "time": b.time}))
                            .collect::<Vec<_>>(),
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        self.db
            .strava
            .save_raw_import(strava_id, StravaActivityImport::ACTIVITY_ZONES, &raw)
            .await?;

        let entries = zones
            .into_iter()
            .map(|z| NewSessionZones {
                zone_type: z.zone_type,
                score: z.score,
                sensor_based: z.sensor_based,
                custom_zones: z.custom_zones,
                points: z.points,
                zones: z
                    .distribution_buckets
                    .into_iter()
                    .map(|b| Zone {
                        min: b.min.round() as i64,
                        max: b.max.round() as i64,
                        time: b.time,
                    })
                    .collect(),
            })
            .collect();

        self.db.zones.save_for_session(session.id, entries).await?;
        Ok(())
    }

    /// Record first visits to every municipality the route touches.
    /// Returns how many visits were new.
    async fn record_visits(&self, session: &TrainingSession) -> Result<usize> {
        let Some(polyline) = session
            .polyline
            .as_deref()
            .or(session.summary_polyline.as_deref())
        else {
            return Ok(0);
        };

        let names = match self.regions.municipalities_for_polyline(polyline) {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, session_id = session.id, "Failed to decode route");
                return Ok(0);
            }
        };

        let visited_on = session
            .start_date
            .unwrap_or_else(|| session.date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());

        let mut inserted = 0;
        for name in names {
            let new = self
                .db
                .visits
                .record(session.user_id, &name, session.id, visited_on)
                .await?;
            if new {
                inserted += 1;
                tracing::info!(
                    user_id = session.user_id,
                    municipality = %name,
                    "First visit to municipality"
                );
            }
        }
        Ok(inserted)
    }

    /// Re-run municipality detection over all of a user's sessions from
    /// stored data, without any Strava calls. Sessions with a Strava ID
    /// but no stored route get their summary polyline backfilled from the
    /// archived payload first. Returns how many sessions gained visits.
    pub async fn parse_activity_data(&self, user_id: i64) -> Result<u32> {
        let sessions = self.db.sessions.list_for_user(user_id).await?;
        let mut gained = 0;

        for mut session in sessions {
            if session.polyline.is_none() && session.summary_polyline.is_none() {
                let Some(strava_id) = session.strava_id else {
                    continue;
                };
                let Some(payload) = self
                    .db
                    .strava
                    .get_raw_import(strava_id, StravaActivityImport::ACTIVITY)
                    .await?
                else {
                    continue;
                };
                let activity = parse_activity(&payload)?;
                let Some(polyline) = activity.get_polyline() else {
                    continue;
                };
                self.db
                    .sessions
                    .update_summary_polyline(session.id, polyline)
                    .await?;
                session.summary_polyline = Some(polyline.to_string());
            }

            if self.record_visits(&session).await? > 0 {
                gained += 1;
            }
        }

        tracing::info!(user_id, gained, "Municipality backfill finished");
        Ok(gained)
    }

    /// Fetch one activity from Strava and import it.
    pub async fn request_and_import_activity(
        &self,
        user_id: i64,
        activity_id: i64,
    ) -> Result<ImportOutcome> {
        if !self.strava.has_any_capacity().await? {
            return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
        }
        let payload = self.strava.get_activity_raw(user_id, activity_id).await?;
        self.import_activity(user_id, &payload).await
    }

    /// Import recent activities for a user, page by page, stopping when
    /// rate limit headroom runs out.
    pub async fn import_recent(&self, user_id: i64, pages: u32) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        // The athlete link normally exists from the OAuth callback; fetch
        // it when missing so premium detection works for zone imports
        if self.db.strava.get_athlete(user_id).await?.is_none() {
            if let Err(e) = self.strava.sync_athlete(user_id).await {
                tracing::warn!(user_id, error = %e, "Failed to sync athlete profile");
            }
        }

        for page in 1..=pages {
            if !self.strava.has_capacity().await? {
                tracing::warn!(user_id, page, "Stopping import run, rate limit headroom low");
                report.rate_limited = true;
                return Ok(report);
            }

            let summaries = self.strava.list_activities(user_id, page, 30).await?;
            if summaries.is_empty() {
                break;
            }

            for summary in summaries {
                if self
                    .db
                    .sessions
                    .find_by_strava_id(summary.id)
                    .await?
                    .is_some()
                {
                    report.already_imported += 1;
                    continue;
                }

                if !self.strava.has_capacity().await? {
                    report.rate_limited = true;
                    return Ok(report);
                }

                match self.request_and_import_activity(user_id, summary.id).await? {
                    ImportOutcome::Imported { .. } => report.imported += 1,
                    ImportOutcome::AlreadyImported => report.already_imported += 1,
                    ImportOutcome::UnmappedType { sport_type } => {
                        if !report.unmapped_types.contains(&sport_type) {
                            report.unmapped_types.push(sport_type);
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    /// Backfill exact start times for sessions that predate start time
    /// tracking. Uses archived payloads where possible, Strava otherwise.
    pub async fn sync_start_times(&self, user_id: i64) -> Result<u32> {
        let sessions = self.db.sessions.list_missing_start_date(user_id).await?;
        let mut updated = 0;

        for session in sessions {
            let Some(strava_id) = session.strava_id else {
                continue;
            };

            let payload = match self
                .db
                .strava
                .get_raw_import(strava_id, StravaActivityImport::ACTIVITY)
                .await?
            {
                Some(payload) => payload,
                None => {
                    if !self.strava.has_capacity().await? {
                        tracing::warn!(user_id, "Stopping start time sync, rate limit headroom low");
                        break;
                    }
                    let payload = self.strava.get_activity_raw(user_id, strava_id).await?;
                    self.db
                        .strava
                        .save_raw_import(strava_id, StravaActivityImport::ACTIVITY, &payload)
                        .await?;
                    payload
                }
            };

            let activity = parse_activity(&payload)?;
            self.db
                .sessions
                .update_start_date(session.id, activity.start_date)
                .await?;
            updated += 1;
        }

        tracing::info!(user_id, updated, "Start time sync finished");
        Ok(updated)
    }

    /// One pass of the background sync: import recent activities for every
    /// user with auto-import enabled.
    pub async fn auto_sync_all(&self, pages: u32) {
        let user_ids = match self.db.strava.auto_import_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list auto-import users");
                return;
            }
        };

        for user_id in user_ids {
            match self.import_recent(user_id, pages).await {
                Ok(report) => {
                    if report.imported > 0 || report.rate_limited {
                        tracing::info!(
                            user_id,
                            imported = report.imported,
                            rate_limited = report.rate_limited,
                            "Auto-sync pass finished"
                        );
                    }
                }
                Err(e) if e.is_strava_token_error() => {
                    tracing::warn!(user_id, "Auto-sync skipped, user needs to re-authorize");
                }
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Auto-sync failed");
                }
            }
        }
    }
}
