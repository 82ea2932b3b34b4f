//! Activity timelines: daily, weekly, and monthly watch buckets.
//!
//! Buckets are sparse; periods with zero events are omitted, and callers
//! needing a dense series reconstruct it from the date range. Bucketing uses
//! a configured fixed UTC offset so profiles in other time zones get local
//! calendar days.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::event::WatchTarget;
use crate::snapshot::ProfileSnapshot;

/// Timeline configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineConfig {
    /// Offset from UTC, in minutes, of the profile's configured time zone.
    pub utc_offset_minutes: i32,
}

impl TimelineConfig {
    /// The local calendar date of a UTC instant under this offset.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.offset()
            .map_or_else(|| at.date_naive(), |o| at.with_timezone(&o).date_naive())
    }

    /// The local hour of day (0-23) of a UTC instant under this offset.
    #[must_use]
    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        self.offset()
            .map_or_else(|| at.hour(), |o| at.with_timezone(&o).hour())
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
    }
}

/// One day with at least one watch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: u32,
    /// Distinct shows watched that day (movies do not count here).
    pub distinct_shows: u32,
}

/// One ISO week with at least one watch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyActivity {
    pub iso_year: i32,
    pub iso_week: u32,
    pub count: u32,
}

/// One calendar month with at least one watch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyActivity {
    pub year: i32,
    pub month: u32,
    pub count: u32,
}

/// Sparse activity series at three granularities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ActivityTimeline {
    pub daily: Vec<DailyActivity>,
    pub weekly: Vec<WeeklyActivity>,
    pub monthly: Vec<MonthlyActivity>,
}

/// Buckets the snapshot's watch events by local calendar day, ISO week, and
/// calendar month.
#[must_use]
pub fn build(snapshot: &ProfileSnapshot, config: &TimelineConfig) -> ActivityTimeline {
    let show_index = snapshot.episode_show_index();

    let mut daily_counts: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut daily_shows: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    let mut weekly: BTreeMap<(i32, u32), u32> = BTreeMap::new();
    let mut monthly: BTreeMap<(i32, u32), u32> = BTreeMap::new();

    for event in &snapshot.events {
        let date = config.local_date(event.watched_at);
        *daily_counts.entry(date).or_insert(0) += 1;

        if let WatchTarget::Episode(id) = &event.target {
            if let Some(show) = show_index.get(id) {
                daily_shows.entry(date).or_default().insert(show.as_str());
            }
        }

        let week = date.iso_week();
        *weekly.entry((week.year(), week.week())).or_insert(0) += 1;
        *monthly.entry((date.year(), date.month())).or_insert(0) += 1;
    }

    ActivityTimeline {
        daily: daily_counts
            .into_iter()
            .map(|(date, count)| DailyActivity {
                date,
                count,
                distinct_shows: daily_shows
                    .get(&date)
                    .map_or(0, |s| u32::try_from(s.len()).unwrap_or(u32::MAX)),
            })
            .collect(),
        weekly: weekly
            .into_iter()
            .map(|((iso_year, iso_week), count)| WeeklyActivity {
                iso_year,
                iso_week,
                count,
            })
            .collect(),
        monthly: monthly
            .into_iter()
            .map(|((year, month), count)| MonthlyActivity { year, month, count })
            .collect(),
    }
}
