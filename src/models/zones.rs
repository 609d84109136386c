// SPDX-License-Identifier: MIT

//! Heart-rate and power zone models.

use serde::{Deserialize, Serialize};

/// Zone distribution for a single session and zone type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionZones {
    pub id: i64,
    pub session_id: i64,
    /// Zone type as reported by Strava ("heartrate" or "power")
    pub zone_type: String,
    /// Suffer score for this effort, if any
    pub score: Option<f64>,
    /// Whether the data came from a sensor rather than an estimate
    pub sensor_based: bool,
    /// Whether the athlete has custom zones configured
    pub custom_zones: bool,
    /// Points scored by Strava for this effort, if any
    pub points: Option<f64>,
    pub zones: Vec<Zone>,
}

/// A single zone bucket: time spent between a minimum and maximum value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    /// Lower bound of the bucket (bpm or watts)
    pub min: i64,
    /// Upper bound of the bucket; -1 means unbounded
    pub max: i64,
    /// Seconds spent in this bucket
    pub time: i64,
}
