// SPDX-License-Identifier: MIT

use std::sync::Arc;

use training_log::config::Config;
use training_log::db::{create_test_database, Database};
use training_log::routes::create_router;
use training_log::services::{RegionService, StravaService};
use training_log::AppState;

/// GeoJSON fixture with two square municipalities and one water body.
///
/// "Amsterdam" covers lon 4.8..5.0, lat 52.3..52.4.
/// "Oldambt" covers lon 6.9..7.1, lat 53.1..53.3.
pub const BOUNDARIES_FIXTURE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "statnaam": "Amsterdam", "water": "NEE" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[4.8, 52.3], [5.0, 52.3], [5.0, 52.4], [4.8, 52.4], [4.8, 52.3]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "statnaam": "Oldambt", "water": "NEE" },
      "geometry": {
        "type": "MultiPolygon",
        "coordinates": [[[[6.9, 53.1], [7.1, 53.1], [7.1, 53.3], [6.9, 53.3], [6.9, 53.1]]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "statnaam": "Waddenzee", "water": "JA" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[4.9, 53.0], [5.4, 53.0], [5.4, 53.5], [4.9, 53.5], [4.9, 53.0]]]
      }
    }
  ]
}"#;

/// Load the fixture boundaries.
#[allow(dead_code)]
pub fn fixture_regions() -> RegionService {
    RegionService::load_from_json(BOUNDARIES_FIXTURE).expect("fixture should parse")
}

/// Encode a lon/lat route as a Strava polyline (precision 5).
#[allow(dead_code)]
pub fn encode_route(coords: Vec<(f64, f64)>) -> String {
    polyline::encode_coordinates(geo::LineString::from(coords), 5)
        .expect("route should encode")
}

/// Create a test app with an in-memory database and fixture boundaries.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db = create_test_database();
    let regions = fixture_regions();

    let state = Arc::new(AppState::new(config, db, regions));
    (create_router(state.clone()), state)
}

/// Fresh in-memory database with migrations applied.
#[allow(dead_code)]
pub fn test_db() -> Database {
    create_test_database()
}

/// Strava service backed by the given database. Never performs real
/// HTTP in tests that stay on the database-only code paths.
#[allow(dead_code)]
pub fn test_strava(db: Database) -> StravaService {
    StravaService::new("test_id".to_string(), "test_secret".to_string(), db)
}

/// A JWT session cookie for the given user.
#[allow(dead_code)]
pub fn session_cookie(user_id: i64) -> String {
    let config = Config::default();
    let jwt = training_log::middleware::create_jwt(user_id, &config.jwt_signing_key)
        .expect("jwt creation");
    format!("training_token={jwt}")
}
