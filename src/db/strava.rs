// SPDX-License-Identifier: MIT

//! Storage for Strava credentials, type mappings, raw imports, rate limit
//! state and the webhook subscription.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::DbPool;
use crate::error::{AppError, Result};
use crate::models::{
    StravaAuth, StravaRateLimit, StravaSubscription, StravaTypeMapping, StravaUser,
    SubscriptionState,
};

fn map_auth(row: &Row<'_>) -> rusqlite::Result<StravaAuth> {
    Ok(StravaAuth {
        user_id: row.get(0)?,
        code: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: row.get(4)?,
        scope: row.get(5)?,
        auto_import: row.get(6)?,
    })
}

fn map_athlete_row(row: &Row<'_>) -> rusqlite::Result<StravaUser> {
    Ok(StravaUser {
        user_id: row.get(0)?,
        athlete_id: row.get(1)?,
        firstname: row.get(2)?,
        lastname: row.get(3)?,
        city: row.get(4)?,
        sex: row.get(5)?,
        premium: row.get(6)?,
        summit: row.get(7)?,
        weight: row.get(8)?,
        resource_state: row.get(9)?,
    })
}

fn map_subscription(row: &Row<'_>) -> rusqlite::Result<(StravaSubscription, String)> {
    let state: String = row.get(4)?;
    Ok((
        StravaSubscription {
            id: row.get(0)?,
            strava_subscription_id: row.get(1)?,
            verify_token: row.get(2)?,
            callback_url: row.get(3)?,
            state: SubscriptionState::Created,
            created_at: row.get(5)?,
        },
        state,
    ))
}

fn resolve_subscription(raw: (StravaSubscription, String)) -> Result<StravaSubscription> {
    let (mut sub, state) = raw;
    sub.state = SubscriptionState::parse(&state)
        .ok_or_else(|| AppError::Database(format!("unknown subscription state: {state}")))?;
    Ok(sub)
}

#[derive(Clone)]
pub struct StravaRepo {
    pool: DbPool,
}

impl StravaRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_auth(&self, user_id: i64) -> Result<Option<StravaAuth>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let auth = conn
                .query_row(
                    "SELECT user_id, code, access_token, refresh_token, expires_at, scope, \
                     auto_import FROM strava_auth WHERE user_id = ?",
                    [user_id],
                    map_auth,
                )
                .optional()?;
            Ok(auth)
        })
        .await?
    }

    pub async fn upsert_auth(&self, auth: StravaAuth) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO strava_auth (user_id, code, access_token, refresh_token, \
                 expires_at, scope, auto_import) VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 code = excluded.code, \
                 access_token = excluded.access_token, \
                 refresh_token = excluded.refresh_token, \
                 expires_at = excluded.expires_at, \
                 scope = excluded.scope",
                params![
                    auth.user_id,
                    auth.code,
                    auth.access_token,
                    auth.refresh_token,
                    auth.expires_at,
                    auth.scope,
                    auth.auto_import,
                ],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn update_token(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let pool = self.pool.clone();
        let access_token = access_token.to_string();
        let refresh_token = refresh_token.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_auth SET access_token = ?, refresh_token = ?, expires_at = ? \
                 WHERE user_id = ?",
                params![access_token, refresh_token, expires_at, user_id],
            )?;
            Ok(())
        })
        .await?
    }

    /// Clear tokens after Strava reports them revoked. The user has to go
    /// through the OAuth flow again.
    pub async fn clear_tokens(&self, user_id: i64) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_auth SET access_token = '', refresh_token = '' WHERE user_id = ?",
                [user_id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn set_auto_import(&self, user_id: i64, enabled: bool) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_auth SET auto_import = ? WHERE user_id = ?",
                params![enabled, user_id],
            )?;
            Ok(())
        })
        .await?
    }

    /// Users who have auto-import enabled and a refresh token on file.
    pub async fn auto_import_user_ids(&self) -> Result<Vec<i64>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT user_id FROM strava_auth WHERE auto_import = 1 AND refresh_token != ''",
            )?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await?
    }

    pub async fn upsert_athlete(&self, athlete: StravaUser) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO strava_users \
                 (user_id, athlete_id, firstname, lastname, city, sex, premium, summit, \
                  weight, resource_state) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 athlete_id = excluded.athlete_id, firstname = excluded.firstname, \
                 lastname = excluded.lastname, city = excluded.city, sex = excluded.sex, \
                 premium = excluded.premium, summit = excluded.summit, \
                 weight = excluded.weight, resource_state = excluded.resource_state",
                params![
                    athlete.user_id,
                    athlete.athlete_id,
                    athlete.firstname,
                    athlete.lastname,
                    athlete.city,
                    athlete.sex,
                    athlete.premium,
                    athlete.summit,
                    athlete.weight,
                    athlete.resource_state
                ],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn get_athlete(&self, user_id: i64) -> Result<Option<StravaUser>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let athlete = conn
                .query_row(
                    "SELECT user_id, athlete_id, firstname, lastname, city, sex, premium, \
                     summit, weight, resource_state FROM strava_users WHERE user_id = ?",
                    [user_id],
                    map_athlete_row,
                )
                .optional()?;
            Ok(athlete)
        })
        .await?
    }

    pub async fn find_user_by_athlete(&self, athlete_id: i64) -> Result<Option<StravaUser>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let athlete = conn
                .query_row(
                    "SELECT user_id, athlete_id, firstname, lastname, city, sex, premium, \
                     summit, weight, resource_state FROM strava_users WHERE athlete_id = ?",
                    [athlete_id],
                    map_athlete_row,
                )
                .optional()?;
            Ok(athlete)
        })
        .await?
    }

    /// Mapping for a Strava sport type. Unknown types are inserted with no
    /// discipline so they show up for manual assignment.
    pub async fn get_or_insert_mapping(&self, strava_type: &str) -> Result<StravaTypeMapping> {
        let pool = self.pool.clone();
        let strava_type = strava_type.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT OR IGNORE INTO strava_type_mappings (strava_type) VALUES (?)",
                [&strava_type],
            )?;
            let mapping = conn.query_row(
                "SELECT id, strava_type, discipline_id FROM strava_type_mappings \
                 WHERE strava_type = ?",
                [&strava_type],
                |row| {
                    Ok(StravaTypeMapping {
                        id: row.get(0)?,
                        strava_type: row.get(1)?,
                        discipline_id: row.get(2)?,
                    })
                },
            )?;
            Ok(mapping)
        })
        .await?
    }

    pub async fn set_mapping_discipline(&self, id: i64, discipline_id: i64) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_type_mappings SET discipline_id = ? WHERE id = ?",
                params![discipline_id, id],
            )?;
            Ok(())
        })
        .await?
    }

    /// Keep the raw Strava payload so imports can be replayed later.
    pub async fn save_raw_import(
        &self,
        strava_id: i64,
        object_type: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let pool = self.pool.clone();
        let object_type = object_type.to_string();
        let payload = payload.to_string();
        let now = Utc::now();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO strava_activity_imports (strava_id, object_type, payload, imported_at) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT(strava_id, object_type) DO UPDATE SET \
                 payload = excluded.payload, imported_at = excluded.imported_at",
                params![strava_id, object_type, payload, now],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn get_raw_import(
        &self,
        strava_id: i64,
        object_type: &str,
    ) -> Result<Option<serde_json::Value>> {
        let pool = self.pool.clone();
        let object_type = object_type.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM strava_activity_imports \
                     WHERE strava_id = ? AND object_type = ?",
                    params![strava_id, object_type],
                    |row| row.get(0),
                )
                .optional()?;
            match payload {
                Some(text) => {
                    let value = serde_json::from_str(&text)
                        .map_err(|e| AppError::Database(format!("corrupt import payload: {e}")))?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        })
        .await?
    }

    pub async fn get_rate_limit(&self) -> Result<StravaRateLimit> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let limit = conn
                .query_row(
                    "SELECT short_limit, daily_limit, short_usage, daily_usage, updated_at \
                     FROM strava_rate_limits WHERE id = 1",
                    [],
                    |row| {
                        Ok(StravaRateLimit {
                            short_limit: row.get(0)?,
                            daily_limit: row.get(1)?,
                            short_usage: row.get(2)?,
                            daily_usage: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(limit.unwrap_or_default())
        })
        .await?
    }

    pub async fn save_rate_limit(&self, limit: StravaRateLimit) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO strava_rate_limits \
                 (id, short_limit, daily_limit, short_usage, daily_usage, updated_at) \
                 VALUES (1, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET \
                 short_limit = excluded.short_limit, daily_limit = excluded.daily_limit, \
                 short_usage = excluded.short_usage, daily_usage = excluded.daily_usage, \
                 updated_at = excluded.updated_at",
                params![
                    limit.short_limit,
                    limit.daily_limit,
                    limit.short_usage,
                    limit.daily_usage,
                    limit.updated_at,
                ],
            )?;
            Ok(())
        })
        .await?
    }

    /// The most recently created webhook subscription, if any.
    pub async fn current_subscription(&self) -> Result<Option<StravaSubscription>> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let raw = conn
                .query_row(
                    "SELECT id, strava_subscription_id, verify_token, callback_url, state, \
                     created_at FROM strava_subscriptions ORDER BY id DESC LIMIT 1",
                    [],
                    map_subscription,
                )
                .optional()?;
            raw.map(resolve_subscription).transpose()
        })
        .await?
    }

    pub async fn find_subscription_by_verify_token(
        &self,
        verify_token: &str,
    ) -> Result<Option<StravaSubscription>> {
        let pool = self.pool.clone();
        let verify_token = verify_token.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let raw = conn
                .query_row(
                    "SELECT id, strava_subscription_id, verify_token, callback_url, state, \
                     created_at FROM strava_subscriptions WHERE verify_token = ?",
                    [&verify_token],
                    map_subscription,
                )
                .optional()?;
            raw.map(resolve_subscription).transpose()
        })
        .await?
    }

    pub async fn insert_subscription(&self, sub: StravaSubscription) -> Result<i64> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "INSERT INTO strava_subscriptions \
                 (strava_subscription_id, verify_token, callback_url, state, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    sub.strava_subscription_id,
                    sub.verify_token,
                    sub.callback_url,
                    sub.state.as_str(),
                    sub.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await?
    }

    pub async fn update_subscription_state(&self, id: i64, state: SubscriptionState) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_subscriptions SET state = ? WHERE id = ?",
                params![state.as_str(), id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn set_subscription_strava_id(&self, id: i64, strava_id: i64) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute(
                "UPDATE strava_subscriptions SET strava_subscription_id = ? WHERE id = ?",
                params![strava_id, id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn delete_subscription(&self, id: i64) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            conn.execute("DELETE FROM strava_subscriptions WHERE id = ?", [id])?;
            Ok(())
        })
        .await?
    }
}
