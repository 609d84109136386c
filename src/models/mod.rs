// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod municipality;
pub mod session;
pub mod strava;
pub mod zones;

pub use municipality::{Municipality, MunicipalityVisit};
pub use session::{Discipline, SessionStatRow, TrainingSession, TrainingType, User};
pub use strava::{
    AuthenticationStatus, StravaActivityImport, StravaAuth, StravaRateLimit, StravaSubscription,
    StravaTypeMapping, StravaUser, SubscriptionState,
};
pub use zones::{SessionZones, Zone};
