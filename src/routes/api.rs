// SPDX-License-Identifier: MIT

//! Authenticated API routes.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::sessions::NewSession;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::session::capitalize;
use crate::models::{SessionZones, TrainingSession};
use crate::services::import::ImportReport;
use crate::services::stats::{all_player_stats, AllPlayerStats, StatsPeriod};
use crate::services::graphs::{graphs_data, GraphsData};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions/{username}", get(list_sessions))
        .route("/api/sessions", post(create_session))
        .route("/api/session/{id}", get(get_session))
        .route("/api/stats/{period}", get(get_stats))
        .route("/api/graphs", get(get_graphs))
        .route("/api/map", get(get_map))
        .route("/api/strava/status", get(strava_status))
        .route("/api/strava/import", post(run_import))
        .route("/api/strava/auto-import/{enable}", post(set_auto_import))
        .route("/api/strava/parse", post(parse_activity_data))
        .route("/api/strava/sync-start-times", post(sync_start_times))
        .route("/api/strava/subscription", get(subscription_status))
        .route("/api/strava/subscription/check", post(check_subscription))
        .route("/api/strava/subscribe", post(subscribe))
        .route("/api/strava/subscribe", delete(unsubscribe))
}

/// Session as returned to the frontend, with display formatting applied.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: TrainingSession,
    pub formatted_duration: String,
    pub formatted_distance: String,
}

impl From<TrainingSession> for SessionResponse {
    fn from(session: TrainingSession) -> Self {
        Self {
            formatted_duration: session.formatted_duration(),
            formatted_distance: session.formatted_distance(),
            session,
        }
    }
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Vec<SessionResponse>>> {
    let user = state
        .db
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {username}")))?;

    let sessions = state.db.sessions.list_for_user(user.id).await?;
    Ok(Json(sessions.into_iter().map(Into::into).collect()))
}

/// Manual session entry. Durations come in as minutes and distance in
/// kilometers, matching the entry form.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub discipline: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub moving_duration_minutes: Option<i64>,
    #[serde(default)]
    pub total_duration_minutes: Option<i64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub training_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>> {
    let discipline = state
        .db
        .sessions
        .find_discipline_by_name(&request.discipline)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(format!("Unknown discipline: {}", request.discipline))
        })?;

    let training_type_id = match request.training_type {
        Some(name) if !name.trim().is_empty() => Some(
            state
                .db
                .sessions
                .get_or_create_training_type(name.trim())
                .await?
                .id,
        ),
        _ => None,
    };

    let session = state
        .db
        .sessions
        .create(NewSession {
            user_id: auth.user_id,
            discipline_id: discipline.id,
            date: request.date,
            start_date: None,
            moving_duration: request.moving_duration_minutes.map(|m| m * 60),
            total_duration: request.total_duration_minutes.map(|m| m * 60),
            distance: request.distance_km.map(|km| km * 1000.0),
            training_type_id,
            notes: request.notes.unwrap_or_default(),
            average_hr: None,
            max_hr: None,
            average_speed: None,
            max_speed: None,
            strava_updated: None,
            strava_id: None,
            polyline: None,
            summary_polyline: None,
        })
        .await?;

    Ok(Json(session.into()))
}

/// Session detail with zone distributions.
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub zones: Vec<SessionZones>,
    /// Municipalities the route passes through
    pub municipalities: Vec<String>,
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SessionDetailResponse>> {
    let session = state
        .db
        .sessions
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;

    let zones = state.db.zones.for_session(id).await?;

    let municipalities = match session
        .polyline
        .as_deref()
        .or(session.summary_polyline.as_deref())
    {
        Some(polyline) => state
            .regions
            .municipalities_for_polyline(polyline)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    Ok(Json(SessionDetailResponse {
        session: session.into(),
        zones,
        municipalities,
    }))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
) -> Result<Json<AllPlayerStats>> {
    let period = StatsPeriod::parse(&period);
    let rows = state.db.sessions.stat_rows(None).await?;
    Ok(Json(all_player_stats(&rows, period, Utc::now())))
}

async fn get_graphs(State(state): State<Arc<AppState>>) -> Result<Json<GraphsData>> {
    let rows = state.db.sessions.stat_rows(None).await?;
    Ok(Json(graphs_data(&rows, Utc::now().date_naive())))
}

/// Optional filters for the map page. Comma-separated lists for users
/// and disciplines, inclusive date bounds.
#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    #[serde(default)]
    pub users: Option<String>,
    #[serde(default)]
    pub disciplines: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

/// Map page data: who has visited each municipality.
#[derive(Debug, Serialize)]
pub struct MapResponse {
    /// All known municipality names
    pub municipalities: Vec<String>,
    pub visits: Vec<MunicipalityVisitors>,
}

#[derive(Debug, Serialize)]
pub struct MunicipalityVisitors {
    pub municipality: String,
    /// Distinct visitor display names
    pub visitors: Vec<String>,
}

fn parse_list(value: &Option<String>) -> Option<Vec<String>> {
    value.as_ref().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

async fn get_map(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<Json<MapResponse>> {
    let users = parse_list(&query.users);
    let disciplines = parse_list(&query.disciplines);

    let rows = state.db.visits.visit_rows().await?;

    let mut visits: Vec<MunicipalityVisitors> = Vec::new();
    for row in rows {
        if let Some(users) = &users {
            if !users.contains(&row.username.to_lowercase()) {
                continue;
            }
        }
        if let Some(disciplines) = &disciplines {
            if !disciplines.contains(&row.discipline.to_lowercase()) {
                continue;
            }
        }
        if query.start.is_some_and(|start| row.date < start)
            || query.end.is_some_and(|end| row.date > end)
        {
            continue;
        }

        let visitor = capitalize(&row.username);
        match visits.iter_mut().find(|v| v.municipality == row.municipality) {
            Some(entry) => {
                if !entry.visitors.contains(&visitor) {
                    entry.visitors.push(visitor);
                }
            }
            None => visits.push(MunicipalityVisitors {
                municipality: row.municipality,
                visitors: vec![visitor],
            }),
        }
    }

    Ok(Json(MapResponse {
        municipalities: state.regions.names(),
        visits,
    }))
}

#[derive(Debug, Serialize)]
pub struct StravaStatusResponse {
    pub status: crate::models::AuthenticationStatus,
}

async fn strava_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<StravaStatusResponse>> {
    let status = state.strava.authentication_status(auth.user_id).await?;
    Ok(Json(StravaStatusResponse { status }))
}

async fn run_import(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ImportReport>> {
    let report = state
        .import
        .import_recent(auth.user_id, state.config.sync_page_count)
        .await?;
    Ok(Json(report))
}

async fn set_auto_import(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(enable): Path<bool>,
) -> Result<Json<serde_json::Value>> {
    state
        .db
        .strava
        .set_auto_import(auth.user_id, enable)
        .await?;
    tracing::info!(user_id = auth.user_id, enable, "Auto-import toggled");
    Ok(Json(serde_json::json!({ "auto_import": enable })))
}

/// Re-run municipality detection over the user's stored sessions,
/// without calling Strava.
async fn parse_activity_data(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let gained = state.import.parse_activity_data(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "sessions_with_new_visits": gained })))
}

async fn sync_start_times(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    let updated = state.import.sync_start_times(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

async fn subscription_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<crate::models::StravaSubscription>>> {
    Ok(Json(state.subscription.status().await?))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub callback_url: String,
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<crate::models::StravaSubscription>> {
    let sub = state.subscription.start(&request.callback_url).await?;
    Ok(Json(sub))
}

async fn unsubscribe(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    state.subscription.stop().await?;
    Ok(Json(serde_json::json!({ "stopped": true })))
}

async fn check_subscription(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    let state_after = state.subscription.check().await?;
    Ok(Json(serde_json::json!({ "state": state_after.as_str() })))
}
