// SPDX-License-Identifier: MIT

//! Business logic services.

pub mod graphs;
pub mod import;
pub mod region;
pub mod stats;
pub mod strava;
pub mod subscription;

pub use import::ImportService;
pub use region::RegionService;
pub use strava::StravaService;
pub use subscription::SubscriptionService;
