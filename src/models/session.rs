// SPDX-License-Identifier: MIT

//! Training session, discipline and user models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An application user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

impl User {
    /// Display name: username with the first letter capitalized.
    pub fn display_name(&self) -> String {
        capitalize(&self.username)
    }
}

/// Capitalize the first character of a name.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A discipline that can be practiced (Swimming, Cycling, Running, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discipline {
    pub id: i64,
    pub name: String,
}

/// A type of training (interval, endurance, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingType {
    pub id: i64,
    pub name: String,
}

/// A training session with all training data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSession {
    pub id: i64,
    pub user_id: i64,
    pub discipline_id: i64,
    /// Calendar date of the session
    pub date: NaiveDate,
    /// Exact start time, when known (Strava imports)
    pub start_date: Option<DateTime<Utc>>,
    /// Moving time in seconds
    pub moving_duration: Option<i64>,
    /// Elapsed time in seconds
    pub total_duration: Option<i64>,
    /// Distance in meters
    pub distance: Option<f64>,
    pub training_type_id: Option<i64>,
    pub notes: String,
    pub date_added: DateTime<Utc>,
    pub average_hr: Option<f64>,
    pub max_hr: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    /// When this session was last touched by a Strava import
    pub strava_updated: Option<DateTime<Utc>>,
    pub strava_id: Option<i64>,
    /// Full-resolution route polyline (Strava encoded, precision 5)
    pub polyline: Option<String>,
    /// Summary route polyline
    pub summary_polyline: Option<String>,
}

impl TrainingSession {
    /// Format the moving duration nicely ("1h 20m"), or "N/A".
    pub fn formatted_duration(&self) -> String {
        match self.moving_duration {
            Some(secs) => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
            None => "N/A".to_string(),
        }
    }

    /// Format the distance nicely ("12.48 km"), or "N/A".
    pub fn formatted_distance(&self) -> String {
        match self.distance {
            Some(meters) => format!("{:.2} km", meters / 1000.0),
            None => "N/A".to_string(),
        }
    }
}

/// A session row joined with its user and discipline names, as consumed by
/// the stats and graphs pipelines.
#[derive(Debug, Clone)]
pub struct SessionStatRow {
    pub username: String,
    pub discipline: String,
    pub date: NaiveDate,
    pub start_date: Option<DateTime<Utc>>,
    pub moving_duration: Option<i64>,
    pub total_duration: Option<i64>,
    pub distance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(moving_duration: Option<i64>, distance: Option<f64>) -> TrainingSession {
        TrainingSession {
            id: 1,
            user_id: 1,
            discipline_id: 1,
            date: NaiveDate::from_ymd_opt(2023, 8, 23).unwrap(),
            start_date: None,
            moving_duration,
            total_duration: None,
            distance,
            training_type_id: None,
            notes: String::new(),
            date_added: Utc::now(),
            average_hr: None,
            max_hr: None,
            average_speed: None,
            max_speed: None,
            strava_updated: None,
            strava_id: None,
            polyline: None,
            summary_polyline: None,
        }
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(session(Some(4820), None).formatted_duration(), "1h 20m");
        assert_eq!(session(None, None).formatted_duration(), "N/A");
    }

    #[test]
    fn test_formatted_distance() {
        assert_eq!(session(None, Some(12480.0)).formatted_distance(), "12.48 km");
        assert_eq!(session(None, None).formatted_distance(), "N/A");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("testuser"), "Testuser");
        assert_eq!(capitalize(""), "");
    }
}
