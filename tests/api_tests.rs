// SPDX-License-Identifier: MIT

//! Router-level tests: authentication, API endpoints and the webhook
//! verification handshake.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;
use training_log::models::{StravaSubscription, SubscriptionState};

mod common;

use common::{create_test_app, session_cookie};

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/graphs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/graphs")
                .header(header::COOKIE, "training_token=not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_graphs_with_valid_session() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/graphs")
                .header(header::COOKIE, session_cookie(user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["total_hours_trained"].is_object());
    assert!(json["weekly_hours_trained"].is_object());
}

#[tokio::test]
async fn test_create_and_list_sessions() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();
    let cookie = session_cookie(user.id);

    let payload = serde_json::json!({
        "discipline": "Running",
        "date": "2023-08-20",
        "moving_duration_minutes": 45,
        "distance_km": 10.5,
        "training_type": "interval",
        "notes": "track session"
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sessions")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let created = body_json(response).await;
    assert_eq!(created["moving_duration"], 45 * 60);
    assert_eq!(created["distance"], 10500.0);
    assert_eq!(created["formatted_distance"], "10.50 km");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/sessions/anna")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sessions = body_json(response).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["notes"], "track session");
}

#[tokio::test]
async fn test_unknown_discipline_is_rejected() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();

    let payload = serde_json::json!({
        "discipline": "Chess",
        "date": "2023-08-20"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sessions")
                .header(header::COOKIE, session_cookie(user.id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_detail_not_found() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/session/999")
                .header(header::COOKIE, session_cookie(user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/stats/week")
                .header(header::COOKIE, session_cookie(user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["players"].is_array());
}

#[tokio::test]
async fn test_map_endpoint_groups_visitors_by_municipality() {
    let (app, state) = create_test_app();
    let user = state.db.users.get_or_create("anna").await.unwrap();
    let running = state
        .db
        .sessions
        .find_discipline_by_name("Running")
        .await
        .unwrap()
        .unwrap();
    let session = state
        .db
        .sessions
        .create(training_log::db::sessions::NewSession {
            user_id: user.id,
            discipline_id: running.id,
            date: chrono::NaiveDate::from_ymd_opt(2023, 8, 20).unwrap(),
            start_date: None,
            moving_duration: Some(1800),
            total_duration: Some(1800),
            distance: Some(5000.0),
            training_type_id: None,
            notes: String::new(),
            average_hr: None,
            max_hr: None,
            average_speed: None,
            max_speed: None,
            strava_updated: None,
            strava_id: None,
            polyline: None,
            summary_polyline: None,
        })
        .await
        .unwrap();
    state
        .db
        .visits
        .record(user.id, "Amsterdam", session.id, Utc::now())
        .await
        .unwrap();

    let cookie = session_cookie(user.id);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/map")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let names: Vec<&str> = json["municipalities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Amsterdam", "Oldambt"]);
    assert_eq!(json["visits"][0]["municipality"], "Amsterdam");
    assert_eq!(json["visits"][0]["visitors"][0], "Anna");

    // Discipline filter excludes the visit
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/map?disciplines=Swimming")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["visits"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_verification_echoes_challenge() {
    let (app, state) = create_test_app();

    state
        .db
        .strava
        .insert_subscription(StravaSubscription {
            id: 0,
            strava_subscription_id: None,
            verify_token: "tok-abc".to_string(),
            callback_url: "https://example.com/strava/webhook".to_string(),
            state: SubscriptionState::Created,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/strava/webhook?hub.mode=subscribe&hub.challenge=c-123&hub.verify_token=tok-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["hub.challenge"], "c-123");

    // Verification marks the subscription as validated
    let sub = state.db.strava.current_subscription().await.unwrap().unwrap();
    assert_eq!(sub.state, SubscriptionState::Validated);
}

#[tokio::test]
async fn test_webhook_verification_rejects_unknown_token() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/strava/webhook?hub.mode=subscribe&hub.challenge=c-123&hub.verify_token=wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_verification_rejects_bad_mode() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/strava/webhook?hub.mode=unsubscribe&hub.challenge=c-123&hub.verify_token=tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_event_always_returns_ok() {
    let (app, _state) = create_test_app();

    // Unparseable events are acknowledged so Strava does not retry
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/strava/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"surprise": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Events for unknown athletes are ignored
    let event = serde_json::json!({
        "object_type": "activity",
        "object_id": 42,
        "aspect_type": "create",
        "owner_id": 777
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/strava/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
