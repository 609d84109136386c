// SPDX-License-Identifier: MIT

//! Webhook routes for Strava events.

use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/strava/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
///
/// Strava calls this while our create request is in flight and expects
/// the challenge echoed back.
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode != "subscribe" {
        tracing::warn!(mode = %params.mode, "Webhook verification with unexpected mode");
        return (StatusCode::FORBIDDEN, Json(VerifyResponse::default()));
    }

    match state
        .subscription
        .handle_validation(&params.verify_token)
        .await
    {
        Ok(true) => {
            tracing::info!("Webhook subscription verified");
            (
                StatusCode::OK,
                Json(VerifyResponse {
                    challenge: params.challenge,
                }),
            )
        }
        Ok(false) => {
            tracing::warn!("Webhook verification failed: unknown verify token");
            (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook verification failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(VerifyResponse::default()))
        }
    }
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    object_type: String, // "activity" or "athlete"
    object_id: i64,
    aspect_type: String, // "create", "update", "delete"
    owner_id: i64,
}

/// Handle incoming webhook events (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    tracing::info!(payload = %payload, "Webhook event received");

    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    match (event.object_type.as_str(), event.aspect_type.as_str()) {
        ("activity", "create") => {
            let user = match state.db.strava.find_user_by_athlete(event.owner_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    tracing::warn!(
                        athlete_id = event.owner_id,
                        "Webhook for unknown athlete, ignoring"
                    );
                    return StatusCode::OK;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to look up athlete");
                    return StatusCode::OK;
                }
            };

            // Import in the background so Strava gets its 200 quickly
            let import = state.import.clone();
            let activity_id = event.object_id;
            let user_id = user.user_id;
            tokio::spawn(async move {
                match import.request_and_import_activity(user_id, activity_id).await {
                    Ok(outcome) => {
                        tracing::info!(user_id, activity_id, ?outcome, "Webhook import finished")
                    }
                    Err(e) => {
                        tracing::error!(user_id, activity_id, error = %e, "Webhook import failed")
                    }
                }
            });
        }
        _ => {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                "Ignoring unhandled event type"
            );
        }
    }

    // Always return 200 OK quickly (Strava requirement)
    StatusCode::OK
}
