// SPDX-License-Identifier: MIT

//! Time series data for the training graphs.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::models::session::capitalize;
use crate::models::SessionStatRow;
use crate::services::stats::TRAINING_START_DATE;

/// One player's line in a graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSeries {
    pub username: String,
    pub values: Vec<f64>,
}

/// Labels plus one series per player.
#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub labels: Vec<String>,
    pub series: Vec<GraphSeries>,
}

/// All graphs shown on the graphs page.
#[derive(Debug, Clone, Serialize)]
pub struct GraphsData {
    /// Cumulative hours trained per day
    pub total_hours_trained: GraphData,
    /// Hours trained per ISO week
    pub weekly_hours_trained: GraphData,
}

fn round_hours(secs: i64) -> f64 {
    (secs as f64 / 3600.0 * 100.0).round() / 100.0
}

fn usernames_in_order(rows: &[SessionStatRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        if !names.contains(&row.username) {
            names.push(row.username.clone());
        }
    }
    names.sort();
    names
}

/// Cumulative hours per player for every day from the start of the log
/// until today.
fn total_hours_graph(rows: &[SessionStatRow], today: NaiveDate) -> GraphData {
    let usernames = usernames_in_order(rows);

    let mut labels = Vec::new();
    let mut day = TRAINING_START_DATE;
    while day <= today {
        labels.push(day.format("%Y-%m-%d").to_string());
        day += Duration::days(1);
    }

    let series = usernames
        .into_iter()
        .map(|username| {
            let mut values = Vec::with_capacity(labels.len());
            let mut running_secs = 0i64;
            let mut day = TRAINING_START_DATE;
            while day <= today {
                running_secs += rows
                    .iter()
                    .filter(|r| r.username == username && r.date == day)
                    .filter_map(|r| r.moving_duration)
                    .sum::<i64>();
                values.push(round_hours(running_secs));
                day += Duration::days(1);
            }
            GraphSeries {
                username: capitalize(&username),
                values,
            }
        })
        .collect();

    GraphData { labels, series }
}

/// ISO week label like "2023-W34".
fn week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Hours per ISO week per player, ignoring anything that predates the
/// log. Weeks appear in the order the data first touches them.
fn weekly_hours_graph(rows: &[SessionStatRow]) -> GraphData {
    let mut sorted: Vec<&SessionStatRow> = rows
        .iter()
        .filter(|r| r.date >= TRAINING_START_DATE)
        .collect();
    sorted.sort_by_key(|r| r.date);

    let mut usernames: Vec<String> = Vec::new();
    for row in &sorted {
        if !usernames.contains(&row.username) {
            usernames.push(row.username.clone());
        }
    }
    usernames.sort();

    let mut labels: Vec<String> = Vec::new();
    for row in &sorted {
        let label = week_label(row.date);
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    let series = usernames
        .into_iter()
        .map(|username| {
            let values = labels
                .iter()
                .map(|label| {
                    let secs: i64 = sorted
                        .iter()
                        .filter(|r| r.username == username && &week_label(r.date) == label)
                        .filter_map(|r| r.moving_duration)
                        .sum();
                    round_hours(secs)
                })
                .collect();
            GraphSeries {
                username: capitalize(&username),
                values,
            }
        })
        .collect();

    GraphData { labels, series }
}

/// Build all graph data from the full session history.
pub fn graphs_data(rows: &[SessionStatRow], today: NaiveDate) -> GraphsData {
    GraphsData {
        total_hours_trained: total_hours_graph(rows, today),
        weekly_hours_trained: weekly_hours_graph(rows),
    }
}
