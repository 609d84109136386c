// SPDX-License-Identifier: MIT

//! Import pipeline tests using archived payloads only (no network).

mod common;

use common::{encode_route, fixture_regions, test_db, test_strava};
use training_log::services::import::{parse_activity, ImportOutcome, ImportService};

fn activity_payload(id: i64, sport_type: &str, polyline: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": "Morning Ride",
        "sport_type": sport_type,
        "start_date": "2023-08-20T09:00:00Z",
        "moving_time": 3600,
        "elapsed_time": 3720,
        "distance": 30000.0,
        "average_heartrate": 140.5,
        "max_heartrate": 172.0,
        "average_speed": 8.3,
        "max_speed": 14.1,
        "map": {
            "polyline": polyline,
            "summary_polyline": null
        }
    })
}

async fn setup() -> (training_log::db::Database, ImportService) {
    let db = test_db();
    let strava = test_strava(db.clone());
    let import = ImportService::new(db.clone(), strava, fixture_regions());

    // Map "Ride" to Cycling so imports create sessions
    let mapping = db.strava.get_or_insert_mapping("Ride").await.unwrap();
    let cycling = db
        .sessions
        .find_discipline_by_name("Cycling")
        .await
        .unwrap()
        .unwrap();
    db.strava
        .set_mapping_discipline(mapping.id, cycling.id)
        .await
        .unwrap();

    (db, import)
}

#[test]
fn test_parse_activity() {
    let payload = activity_payload(42, "Ride", None);
    let activity = parse_activity(&payload).unwrap();

    assert_eq!(activity.id, 42);
    assert_eq!(activity.sport_type, "Ride");
    assert_eq!(activity.moving_time, Some(3600));
    assert_eq!(activity.start_date.to_rfc3339(), "2023-08-20T09:00:00+00:00");
    assert!(activity.get_polyline().is_none());

    assert!(parse_activity(&serde_json::json!({"nonsense": true})).is_err());
}

#[tokio::test]
async fn test_import_creates_session_and_visits() {
    let (db, import) = setup().await;
    let user = db.users.get_or_create("anna").await.unwrap();

    // Route through the Amsterdam fixture square
    let route = encode_route(vec![(4.85, 52.35), (4.9, 52.36), (4.95, 52.35)]);
    let payload = activity_payload(1001, "Ride", Some(&route));

    let outcome = import.import_activity(user.id, &payload).await.unwrap();
    let ImportOutcome::Imported { session_id } = outcome else {
        panic!("expected import, got {outcome:?}");
    };

    let session = db.sessions.find_by_id(session_id).await.unwrap().unwrap();
    assert_eq!(session.strava_id, Some(1001));
    assert_eq!(session.moving_duration, Some(3600));
    assert_eq!(session.distance, Some(30000.0));
    assert!(session.start_date.is_some());
    assert_eq!(session.notes, "Morning Ride");

    // Raw payload archived
    assert!(db
        .strava
        .get_raw_import(1001, "activity")
        .await
        .unwrap()
        .is_some());

    // Route touched Amsterdam
    let visits = db.visits.list_for_user(user.id).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].municipality, "Amsterdam");
    assert_eq!(visits[0].session_id, session_id);
}

#[tokio::test]
async fn test_import_is_idempotent() {
    let (db, import) = setup().await;
    let user = db.users.get_or_create("anna").await.unwrap();

    let payload = activity_payload(1002, "Ride", None);
    let first = import.import_activity(user.id, &payload).await.unwrap();
    assert!(matches!(first, ImportOutcome::Imported { .. }));

    let second = import.import_activity(user.id, &payload).await.unwrap();
    assert_eq!(second, ImportOutcome::AlreadyImported);

    assert_eq!(db.sessions.list_for_user(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_sport_type_is_recorded_for_mapping() {
    let (db, import) = setup().await;
    let user = db.users.get_or_create("anna").await.unwrap();

    let payload = activity_payload(1003, "Windsurf", None);
    let outcome = import.import_activity(user.id, &payload).await.unwrap();
    assert_eq!(
        outcome,
        ImportOutcome::UnmappedType {
            sport_type: "Windsurf".to_string()
        }
    );

    // No session, but the type now exists for manual assignment and the
    // payload is archived for replay
    assert!(db.sessions.list_for_user(user.id).await.unwrap().is_empty());
    let mapping = db.strava.get_or_insert_mapping("Windsurf").await.unwrap();
    assert!(mapping.discipline_id.is_none());
    assert!(db
        .strava
        .get_raw_import(1003, "activity")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_parse_activity_data_backfills_routes_and_visits() {
    let (db, import) = setup().await;
    let user = db.users.get_or_create("anna").await.unwrap();
    let cycling = db
        .sessions
        .find_discipline_by_name("Cycling")
        .await
        .unwrap()
        .unwrap();

    // Session imported before routes were stored
    let session = db
        .sessions
        .create(training_log::db::sessions::NewSession {
            user_id: user.id,
            discipline_id: cycling.id,
            date: chrono::NaiveDate::from_ymd_opt(2023, 8, 20).unwrap(),
            start_date: None,
            moving_duration: Some(3600),
            total_duration: Some(3720),
            distance: Some(30000.0),
            training_type_id: None,
            notes: String::new(),
            average_hr: None,
            max_hr: None,
            average_speed: None,
            max_speed: None,
            strava_updated: None,
            strava_id: Some(1005),
            polyline: None,
            summary_polyline: None,
        })
        .await
        .unwrap();

    let route = encode_route(vec![(4.85, 52.35), (4.9, 52.36)]);
    let payload = activity_payload(1005, "Ride", Some(&route));
    db.strava
        .save_raw_import(1005, "activity", &payload)
        .await
        .unwrap();

    let gained = import.parse_activity_data(user.id).await.unwrap();
    assert_eq!(gained, 1);

    let reloaded = db.sessions.find_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(reloaded.summary_polyline.as_deref(), Some(route.as_str()));

    let visits = db.visits.list_for_user(user.id).await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].municipality, "Amsterdam");

    // Visits already recorded, so a second pass gains nothing
    assert_eq!(import.parse_activity_data(user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_start_time_sync_uses_archived_payloads() {
    let (db, import) = setup().await;
    let user = db.users.get_or_create("anna").await.unwrap();
    let cycling = db
        .sessions
        .find_discipline_by_name("Cycling")
        .await
        .unwrap()
        .unwrap();

    // Legacy row: imported before start times were tracked
    let session = db
        .sessions
        .create(training_log::db::sessions::NewSession {
            user_id: user.id,
            discipline_id: cycling.id,
            date: chrono::NaiveDate::from_ymd_opt(2023, 8, 20).unwrap(),
            start_date: None,
            moving_duration: Some(3600),
            total_duration: Some(3720),
            distance: Some(30000.0),
            training_type_id: None,
            notes: String::new(),
            average_hr: None,
            max_hr: None,
            average_speed: None,
            max_speed: None,
            strava_updated: None,
            strava_id: Some(1004),
            polyline: None,
            summary_polyline: None,
        })
        .await
        .unwrap();

    // Archived payload from the original import
    let payload = activity_payload(1004, "Ride", None);
    db.strava
        .save_raw_import(1004, "activity", &payload)
        .await
        .unwrap();

    let updated = import.sync_start_times(user.id).await.unwrap();
    assert_eq!(updated, 1);

    let reloaded = db.sessions.find_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(
        reloaded.start_date.unwrap().to_rfc3339(),
        "2023-08-20T09:00:00+00:00"
    );

    // Second run finds nothing left to do
    assert_eq!(import.sync_start_times(user.id).await.unwrap(), 0);
}
