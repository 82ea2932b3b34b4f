//! Watching velocity: pace, most-active periods, and trend direction.

use std::fmt;

use chrono::{Datelike, Duration, Weekday};
use serde::{Deserialize, Serialize};

use crate::snapshot::ProfileSnapshot;
use crate::timeline::TimelineConfig;

/// Velocity analysis configuration.
#[derive(Debug, Clone, Copy)]
pub struct VelocityConfig {
    /// Trailing window for pace calculation, in days. Default: 90.
    pub window_days: i64,
    /// Relative change beyond which the trend is labeled
    /// increasing/decreasing. Default: 0.10 (±10%).
    pub trend_threshold: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            trend_threshold: 0.10,
        }
    }
}

/// Trend direction over the trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived watching pace over the trailing window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchVelocity {
    /// Mean watch events per day over the window.
    pub per_day: f64,
    /// Extrapolated events per week.
    pub per_week: f64,
    /// Extrapolated events per month (30 days).
    pub per_month: f64,
    /// Day of week with the highest cumulative count, e.g. "Monday".
    pub most_active_day: String,
    /// Hour of day (0-23, profile-local) with the highest cumulative count.
    pub most_active_hour: u8,
    pub trend: Trend,
}

/// Analyzes watching velocity over the trailing window ending at the
/// snapshot instant.
///
/// Returns `None` when the window contains no events; the section degrades
/// to insufficient-data rather than reporting a fabricated zero pace.
#[must_use]
pub fn analyze(
    snapshot: &ProfileSnapshot,
    config: &VelocityConfig,
    timeline_config: &TimelineConfig,
) -> Option<WatchVelocity> {
    let window_start = snapshot.as_of - Duration::days(config.window_days);
    let half_start = snapshot.as_of - Duration::days(config.window_days / 2);

    let mut total: u64 = 0;
    let mut recent_half: u64 = 0;
    let mut prior_half: u64 = 0;
    let mut weekday_counts = [0u64; 7];
    let mut hour_counts = [0u64; 24];

    for event in &snapshot.events {
        if event.watched_at < window_start || event.watched_at > snapshot.as_of {
            continue;
        }
        total += 1;
        if event.watched_at >= half_start {
            recent_half += 1;
        } else {
            prior_half += 1;
        }
        let date = timeline_config.local_date(event.watched_at);
        weekday_counts[date.weekday().num_days_from_monday() as usize] += 1;
        hour_counts[timeline_config.local_hour(event.watched_at) as usize] += 1;
    }

    if total == 0 {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let per_day = total as f64 / config.window_days as f64;

    // Ties resolve to the earliest day/hour for deterministic output.
    let most_active_day = weekday_counts
        .iter()
        .enumerate()
        .max_by(|(ai, a), (bi, b)| a.cmp(b).then(bi.cmp(ai)))
        .map_or(Weekday::Mon, |(i, _)| weekday_from_index(i));
    let most_active_hour = hour_counts
        .iter()
        .enumerate()
        .max_by(|(ai, a), (bi, b)| a.cmp(b).then(bi.cmp(ai)))
        .map_or(0, |(i, _)| u8::try_from(i).unwrap_or(0));

    Some(WatchVelocity {
        per_day,
        per_week: per_day * 7.0,
        per_month: per_day * 30.0,
        most_active_day: weekday_name(most_active_day).to_string(),
        most_active_hour,
        trend: trend_label(prior_half, recent_half, config.trend_threshold),
    })
}

/// Compares the mean rate of the two window halves.
fn trend_label(prior: u64, recent: u64, threshold: f64) -> Trend {
    if prior == 0 {
        return if recent > 0 {
            Trend::Increasing
        } else {
            Trend::Stable
        };
    }
    #[allow(clippy::cast_precision_loss)]
    let change = (recent as f64 - prior as f64) / prior as f64;
    if change > threshold {
        Trend::Increasing
    } else if change < -threshold {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

const fn weekday_from_index(i: usize) -> Weekday {
    match i {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
