//! Abandonment risk, time-to-watch, backlog aging, and content discovery.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::WatchTarget;
use crate::snapshot::ProfileSnapshot;
use crate::status::{ShowRollup, WatchStatus};
use crate::types::{Percent, ShowId};

/// Days without activity before a `Watching` show is considered at risk.
pub const ABANDONMENT_IDLE_DAYS: i64 = 30;

/// Trailing window for discovery-rate calculations, in days.
const DISCOVERY_WINDOW_DAYS: i64 = 90;

/// A show being watched but idle long enough to qualify as at risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtRiskShow {
    pub show: ShowId,
    pub title: String,
    pub days_since_last_watch: i64,
    pub unwatched_aired_episodes: u32,
}

/// Days from adding a show to starting and finishing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeToWatch {
    pub show: ShowId,
    /// Days between adding the show and the first watched episode.
    pub days_to_start: i64,
    /// Days between the first and last watched episode. Only present for
    /// shows in a terminal state at measurement time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_to_finish: Option<i64>,
}

/// Never-started shows bucketed by days since they were added.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BacklogAging {
    pub over_30_days: u32,
    pub over_90_days: u32,
    pub over_365_days: u32,
}

/// Content-addition and consumption rates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentDiscovery {
    /// Days since any content was added; `None` when nothing was ever added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_last_added: Option<i64>,
    /// Shows added per month over the trailing window.
    pub shows_added_per_month: f64,
    /// Movies added per month over the trailing window.
    pub movies_added_per_month: f64,
    /// Shows completed ÷ shows added over the trailing window; a ratio above
    /// 1 means the backlog is shrinking. `None` without additions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_watch_to_add_ratio: Option<f64>,
    /// Movies watched ÷ movies added over the trailing window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_watch_to_add_ratio: Option<f64>,
}

/// Content not yet released, separated from aired-but-unwatched backlog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnairedCounts {
    pub shows: u32,
    pub seasons: u32,
    pub episodes: u32,
    pub movies: u32,
    /// Already aired but never watched.
    pub aired_unwatched_episodes: u32,
    /// Already released but never watched.
    pub released_unwatched_movies: u32,
}

/// Combined risk and discovery report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAndDiscoveryReport {
    /// At-risk shows, most idle first.
    pub at_risk: Vec<AtRiskShow>,
    /// Shows ever started but never finished ÷ shows started, excluding
    /// shows still in production.
    pub abandonment_rate: Percent,
    pub time_to_watch: Vec<TimeToWatch>,
    pub backlog: BacklogAging,
    pub discovery: ContentDiscovery,
    pub unaired: UnairedCounts,
}

/// Analyzes abandonment risk, backlog aging, and discovery rates.
///
/// `rollups` must be parallel to `snapshot.shows`, as produced by the
/// composer.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn analyze(snapshot: &ProfileSnapshot, rollups: &[ShowRollup]) -> RiskAndDiscoveryReport {
    debug_assert_eq!(snapshot.shows.len(), rollups.len());

    let as_of = snapshot.as_of_date();
    let show_index = snapshot.episode_show_index();

    // Last watch event per show.
    let mut last_watch: HashMap<&ShowId, DateTime<Utc>> = HashMap::new();
    for event in &snapshot.events {
        if let WatchTarget::Episode(id) = &event.target {
            if let Some(show) = show_index.get(id) {
                let entry = last_watch.entry(*show).or_insert(event.watched_at);
                *entry = (*entry).max(event.watched_at);
            }
        }
    }

    let mut at_risk: Vec<AtRiskShow> = Vec::new();
    let mut started: u32 = 0;
    let mut finished: u32 = 0;
    let mut time_to_watch: Vec<TimeToWatch> = Vec::new();
    let mut backlog = BacklogAging::default();

    for (show, rollup) in snapshot.shows.iter().zip(rollups) {
        let first = show
            .episodes()
            .filter_map(|e| {
                snapshot
                    .events
                    .iter()
                    .find(|ev| ev.target.as_episode() == Some(&e.id))
                    .map(|ev| ev.watched_at)
            })
            .min();

        if rollup.status == WatchStatus::Watching {
            if let Some(last) = last_watch.get(&show.id) {
                let idle = (snapshot.as_of - *last).num_days();
                if idle >= ABANDONMENT_IDLE_DAYS {
                    at_risk.push(AtRiskShow {
                        show: show.id.clone(),
                        title: show.title.clone(),
                        days_since_last_watch: idle,
                        unwatched_aired_episodes: rollup
                            .aired_episodes
                            .saturating_sub(rollup.watched_episodes),
                    });
                }
            }
        }

        // Abandonment rate counts only shows that can still be abandoned:
        // in-production shows are excluded from both sides.
        if first.is_some() && !show.in_production {
            started += 1;
            if rollup.status == WatchStatus::Watched {
                finished += 1;
            }
        }

        if let Some(added) = snapshot.show_added.get(&show.id) {
            match first {
                Some(first_watch) => {
                    let days_to_start = (first_watch - *added).num_days().max(0);
                    let days_to_finish = if rollup.status.is_terminal() {
                        last_watch
                            .get(&show.id)
                            .map(|last| (*last - first_watch).num_days().max(0))
                    } else {
                        None
                    };
                    time_to_watch.push(TimeToWatch {
                        show: show.id.clone(),
                        days_to_start,
                        days_to_finish,
                    });
                }
                None => {
                    let age = (snapshot.as_of - *added).num_days();
                    if age > 365 {
                        backlog.over_365_days += 1;
                    }
                    if age > 90 {
                        backlog.over_90_days += 1;
                    }
                    if age > 30 {
                        backlog.over_30_days += 1;
                    }
                }
            }
        }
    }
    at_risk.sort_by(|a, b| {
        b.days_since_last_watch
            .cmp(&a.days_since_last_watch)
            .then(a.show.cmp(&b.show))
    });
    time_to_watch.sort_by(|a, b| a.show.cmp(&b.show));

    let abandonment_rate =
        Percent::from_ratio(u64::from(started.saturating_sub(finished)), u64::from(started));

    // Discovery over the trailing window.
    let window_start = snapshot.as_of - Duration::days(DISCOVERY_WINDOW_DAYS);
    #[allow(clippy::cast_precision_loss)]
    let months = DISCOVERY_WINDOW_DAYS as f64 / 30.0;

    let last_added = snapshot
        .show_added
        .values()
        .chain(snapshot.movie_added.values())
        .max();
    let days_since_last_added = last_added.map(|added| (snapshot.as_of - *added).num_days());

    let shows_added = snapshot
        .show_added
        .values()
        .filter(|added| **added >= window_start)
        .count();
    let movies_added = snapshot
        .movie_added
        .values()
        .filter(|added| **added >= window_start)
        .count();

    let shows_completed = snapshot
        .shows
        .iter()
        .zip(rollups)
        .filter(|(show, rollup)| {
            rollup.status == WatchStatus::Watched
                && last_watch.get(&show.id).is_some_and(|t| *t >= window_start)
        })
        .count();
    let movie_watches = snapshot.movie_watch_times();
    let movies_watched = movie_watches
        .values()
        .filter(|watched| **watched >= window_start)
        .count();

    #[allow(clippy::cast_precision_loss)]
    let discovery = ContentDiscovery {
        days_since_last_added,
        shows_added_per_month: shows_added as f64 / months,
        movies_added_per_month: movies_added as f64 / months,
        show_watch_to_add_ratio: (shows_added > 0)
            .then(|| shows_completed as f64 / shows_added as f64),
        movie_watch_to_add_ratio: (movies_added > 0)
            .then(|| movies_watched as f64 / movies_added as f64),
    };

    // Unaired vs aired-but-unwatched.
    let watched_episodes = snapshot.episode_watch_times();
    let mut unaired = UnairedCounts::default();
    for (show, rollup) in snapshot.shows.iter().zip(rollups) {
        if rollup.status == WatchStatus::Unaired {
            unaired.shows += 1;
        }
        for season in &rollup.seasons {
            if season.status == WatchStatus::Unaired {
                unaired.seasons += 1;
            }
        }
        for episode in show.episodes() {
            if episode.has_aired(as_of) {
                if !watched_episodes.contains_key(&episode.id) {
                    unaired.aired_unwatched_episodes += 1;
                }
            } else {
                unaired.episodes += 1;
            }
        }
    }
    for movie in &snapshot.movies {
        if movie.has_released(as_of) {
            if !movie_watches.contains_key(&movie.id) {
                unaired.released_unwatched_movies += 1;
            }
        } else {
            unaired.movies += 1;
        }
    }

    RiskAndDiscoveryReport {
        at_risk,
        abandonment_rate,
        time_to_watch,
        backlog,
        discovery,
        unaired,
    }
}
