// SPDX-License-Identifier: MIT

//! Training log backend: sessions across swimming, cycling and running,
//! with Strava import and municipality visit tracking.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Database;
use services::{ImportService, RegionService, StravaService, SubscriptionService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub regions: RegionService,
    pub strava: StravaService,
    pub import: ImportService,
    pub subscription: SubscriptionService,
}

impl AppState {
    /// Wire up all services on top of a database and loaded boundaries.
    pub fn new(config: Config, db: Database, regions: RegionService) -> Self {
        let strava = StravaService::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            db.clone(),
        );
        let import = ImportService::new(db.clone(), strava.clone(), regions.clone());
        let subscription = SubscriptionService::new(db.clone(), strava.clone());

        Self {
            config,
            db,
            regions,
            strava,
            import,
            subscription,
        }
    }
}
