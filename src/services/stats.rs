// SPDX-License-Identifier: MIT

//! Per-player statistics over training sessions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::session::capitalize;
use crate::models::SessionStatRow;

/// Nobody trained before the log existed.
pub const TRAINING_START_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2023, 5, 1) {
    Some(date) => date,
    None => panic!("invalid training start date"),
};

/// A run within this window after a ride ends makes the pair a brick.
const BRICK_WINDOW_MINS: i64 = 30;

const LONG_SWIM_MINS: i64 = 60;
const LONG_RIDE_MINS: i64 = 180;
const LONG_RUN_MINS: i64 = 90;

/// Reporting period for the stats table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    All,
    Week,
    Month,
    ThreeMonths,
}

impl StatsPeriod {
    /// Parse a period name, defaulting to the full history for anything
    /// unrecognized.
    pub fn parse(value: &str) -> Self {
        match value {
            "week" => StatsPeriod::Week,
            "month" => StatsPeriod::Month,
            "three_months" => StatsPeriod::ThreeMonths,
            _ => StatsPeriod::All,
        }
    }

    /// First date included in this period.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        match self {
            StatsPeriod::All => TRAINING_START_DATE,
            StatsPeriod::Week => today - Duration::days(7),
            StatsPeriod::Month => today - Duration::days(30),
            StatsPeriod::ThreeMonths => today - Duration::days(90),
        }
    }
}

/// One labeled statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRow {
    pub label: String,
    pub value: String,
}

/// All statistics for one player.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStats {
    pub username: String,
    pub rows: Vec<StatRow>,
}

/// Stats table for every player in one period.
#[derive(Debug, Clone, Serialize)]
pub struct AllPlayerStats {
    pub period: StatsPeriod,
    pub players: Vec<PlayerStats>,
}

/// Format a duration as "1d 10h 30m", dropping the day part when zero.
pub fn format_timedelta(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else {
        format!("{hours}h {minutes}m")
    }
}

/// Format a duration in seconds as "1h 20m", keeping whole hours. Only
/// "Time since last training" uses the day form.
fn format_seconds(secs: i64) -> String {
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

/// When the session happened, preferring the exact start time.
fn session_moment(row: &SessionStatRow) -> DateTime<Utc> {
    row.start_date.unwrap_or_else(|| {
        row.date
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
    })
}

/// Count brick workouts: rides followed by a run starting within the
/// brick window after the ride ends. Each run counts for one ride only,
/// and the nearest following run wins.
pub fn count_bricks(rows: &[SessionStatRow]) -> u32 {
    let mut rides: Vec<(DateTime<Utc>, i64)> = rows
        .iter()
        .filter(|r| r.discipline == "Cycling")
        .filter_map(|r| {
            let start = r.start_date?;
            let duration = r.total_duration.or(r.moving_duration)?;
            Some((start, duration))
        })
        .collect();
    rides.sort_by_key(|(start, _)| *start);

    let mut runs: Vec<DateTime<Utc>> = rows
        .iter()
        .filter(|r| r.discipline == "Running")
        .filter_map(|r| r.start_date)
        .collect();
    runs.sort();

    let window = Duration::minutes(BRICK_WINDOW_MINS);
    let mut bricks = 0;
    let mut run_idx = 0;

    for (start, duration) in rides {
        let ride_end = start + Duration::seconds(duration);
        while run_idx < runs.len() && runs[run_idx] < ride_end {
            run_idx += 1;
        }
        if run_idx < runs.len() && runs[run_idx] <= ride_end + window {
            bricks += 1;
            run_idx += 1;
        }
    }

    bricks
}

fn count_long_sessions(rows: &[SessionStatRow], discipline: &str, min_minutes: i64) -> usize {
    rows.iter()
        .filter(|r| r.discipline == discipline)
        .filter(|r| {
            r.total_duration
                .map(|secs| secs >= min_minutes * 60)
                .unwrap_or(false)
        })
        .count()
}

fn discipline_rows(rows: &[SessionStatRow], discipline: &str, noun: &str) -> Vec<StatRow> {
    let sessions: Vec<&SessionStatRow> =
        rows.iter().filter(|r| r.discipline == discipline).collect();
    let total_secs: i64 = sessions.iter().filter_map(|r| r.total_duration).sum();

    let longest_by_time = sessions.iter().filter_map(|r| r.total_duration).max();
    let longest_by_distance = sessions
        .iter()
        .filter_map(|r| r.distance)
        .fold(None::<f64>, |acc, d| Some(acc.map_or(d, |best| best.max(d))));

    vec![
        StatRow {
            label: format!("Number of {noun}s"),
            value: sessions.len().to_string(),
        },
        StatRow {
            label: format!("Total {noun} time"),
            value: if total_secs > 0 {
                format_seconds(total_secs)
            } else {
                "N/A".to_string()
            },
        },
        StatRow {
            label: format!("Longest {noun} by time"),
            value: longest_by_time
                .map(format_seconds)
                .unwrap_or_else(|| "N/A".to_string()),
        },
        StatRow {
            label: format!("Longest {noun} by distance"),
            value: longest_by_distance
                .map(|meters| format!("{:.2} km", meters / 1000.0))
                .unwrap_or_else(|| "N/A".to_string()),
        },
    ]
}

fn player_stats(username: &str, rows: &[SessionStatRow], now: DateTime<Utc>) -> PlayerStats {
    let mut stat_rows = Vec::new();

    let last_training = rows.iter().map(session_moment).max();
    stat_rows.push(StatRow {
        label: "Time since last training".to_string(),
        value: match last_training {
            Some(last) if last <= now => format_timedelta(now - last),
            _ => "N/A".to_string(),
        },
    });

    let total_secs: i64 = rows.iter().filter_map(|r| r.total_duration).sum();
    stat_rows.push(StatRow {
        label: "Total time trained".to_string(),
        value: if total_secs > 0 {
            format_seconds(total_secs)
        } else {
            "N/A".to_string()
        },
    });

    // Averaged over the whole log, regardless of the selected period
    let days_since_start = (now.date_naive() - TRAINING_START_DATE).num_days().max(7);
    let average_secs = total_secs * 7 / days_since_start;
    stat_rows.push(StatRow {
        label: "Average weekly hours".to_string(),
        value: if total_secs > 0 {
            format_seconds(average_secs)
        } else {
            "N/A".to_string()
        },
    });

    stat_rows.extend(discipline_rows(rows, "Swimming", "swim"));
    stat_rows.extend(discipline_rows(rows, "Cycling", "ride"));
    stat_rows.extend(discipline_rows(rows, "Running", "run"));

    stat_rows.push(StatRow {
        label: format!("Long swims (>{LONG_SWIM_MINS} min)"),
        value: count_long_sessions(rows, "Swimming", LONG_SWIM_MINS).to_string(),
    });
    stat_rows.push(StatRow {
        label: format!("Long rides (>{LONG_RIDE_MINS} min)"),
        value: count_long_sessions(rows, "Cycling", LONG_RIDE_MINS).to_string(),
    });
    stat_rows.push(StatRow {
        label: format!("Long runs (>{LONG_RUN_MINS} min)"),
        value: count_long_sessions(rows, "Running", LONG_RUN_MINS).to_string(),
    });

    stat_rows.push(StatRow {
        label: "Number of brick workouts".to_string(),
        value: count_bricks(rows).to_string(),
    });

    PlayerStats {
        username: capitalize(username),
        rows: stat_rows,
    }
}

/// Build the stats table for every player with sessions in the period.
pub fn all_player_stats(
    rows: &[SessionStatRow],
    period: StatsPeriod,
    now: DateTime<Utc>,
) -> AllPlayerStats {
    let start = period.start_date(now.date_naive());
    let in_period: Vec<SessionStatRow> = rows
        .iter()
        .filter(|r| r.date >= start)
        .cloned()
        .collect();

    let mut usernames: Vec<String> = Vec::new();
    for row in &in_period {
        if !usernames.contains(&row.username) {
            usernames.push(row.username.clone());
        }
    }
    usernames.sort();

    let players = usernames
        .iter()
        .map(|username| {
            let player_rows: Vec<SessionStatRow> = in_period
                .iter()
                .filter(|r| &r.username == username)
                .cloned()
                .collect();
            player_stats(username, &player_rows, now)
        })
        .collect();

    AllPlayerStats { period, players }
}
