//! Progress aggregation: counts, percent-complete, and distributions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::ProfileSnapshot;
use crate::status::{EpisodeRef, ShowRollup, WatchStatus};
use crate::types::{Percent, ShowId};

/// Per-status show counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchStatusCounts {
    pub unaired: u32,
    pub not_watched: u32,
    pub watching: u32,
    pub watched: u32,
    pub up_to_date: u32,
}

impl WatchStatusCounts {
    /// Increments the bucket for the given status.
    pub const fn record(&mut self, status: WatchStatus) {
        match status {
            WatchStatus::Unaired => self.unaired += 1,
            WatchStatus::NotWatched => self.not_watched += 1,
            WatchStatus::Watching => self.watching += 1,
            WatchStatus::Watched => self.watched += 1,
            WatchStatus::UpToDate => self.up_to_date += 1,
        }
    }

    /// Sum across all buckets.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.unaired + self.not_watched + self.watching + self.watched + self.up_to_date
    }

    /// Element-wise sum, for account-scope aggregation.
    #[must_use]
    pub const fn merged(self, other: Self) -> Self {
        Self {
            unaired: self.unaired + other.unaired,
            not_watched: self.not_watched + other.not_watched,
            watching: self.watching + other.watching,
            watched: self.watched + other.watched,
            up_to_date: self.up_to_date + other.up_to_date,
        }
    }
}

/// Episode-level progress. Unaired episodes are excluded from both the
/// numerator and the denominator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EpisodeProgress {
    pub watched: u32,
    pub aired: u32,
    pub percent: Percent,
}

/// Movie-level counts. Movies are binary, so percent is simply
/// watched/total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MovieStats {
    pub total: u32,
    pub watched: u32,
    pub percent: Percent,
}

/// Per-show progress record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowProgress {
    pub show: ShowId,
    pub title: String,
    pub status: WatchStatus,
    pub watched_episodes: u32,
    pub aired_episodes: u32,
    pub total_episodes: u32,
    pub percent: Percent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched: Option<EpisodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_to_watch: Option<EpisodeRef>,
    /// Stale shows are reported but excluded from aggregate episode totals.
    pub stale: bool,
}

/// Profile-scope progress rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileWatchProgress {
    /// Per-show records, in show-id order for deterministic output.
    pub shows: Vec<ShowProgress>,
    pub show_counts: WatchStatusCounts,
    pub episodes: EpisodeProgress,
    pub movies: MovieStats,
    /// A show/movie counts once per distinct genre it carries.
    pub genre_distribution: BTreeMap<String, u32>,
    /// A show/movie counts once per distinct streaming service it carries.
    pub service_distribution: BTreeMap<String, u32>,
    /// Show counts by full status name, for the status breakdown block.
    pub status_distribution: BTreeMap<String, u32>,
}

/// Computes the profile-scope progress rollup.
///
/// `rollups` must be parallel to `snapshot.shows` (one rollup per show, same
/// order); the composer derives them once and shares them across analyzers.
#[must_use]
pub fn aggregate(snapshot: &ProfileSnapshot, rollups: &[ShowRollup]) -> ProfileWatchProgress {
    debug_assert_eq!(snapshot.shows.len(), rollups.len());

    let mut shows: Vec<ShowProgress> = Vec::with_capacity(rollups.len());
    let mut show_counts = WatchStatusCounts::default();
    let mut watched_total: u64 = 0;
    let mut aired_total: u64 = 0;

    for (show, rollup) in snapshot.shows.iter().zip(rollups) {
        show_counts.record(rollup.status);
        if !rollup.stale {
            watched_total += u64::from(rollup.watched_episodes);
            aired_total += u64::from(rollup.aired_episodes);
        }
        shows.push(ShowProgress {
            show: show.id.clone(),
            title: show.title.clone(),
            status: rollup.status,
            watched_episodes: rollup.watched_episodes,
            aired_episodes: rollup.aired_episodes,
            total_episodes: rollup.total_episodes,
            percent: Percent::from_ratio(
                u64::from(rollup.watched_episodes),
                u64::from(rollup.aired_episodes),
            ),
            last_watched: rollup.last_watched.clone(),
            next_to_watch: rollup.next_to_watch.clone(),
            stale: rollup.stale,
        });
    }
    shows.sort_by(|a, b| a.show.cmp(&b.show));

    let episodes = EpisodeProgress {
        watched: u32::try_from(watched_total).unwrap_or(u32::MAX),
        aired: u32::try_from(aired_total).unwrap_or(u32::MAX),
        percent: Percent::from_ratio(watched_total, aired_total),
    };

    let as_of = snapshot.as_of_date();
    let movie_watches = snapshot.movie_watch_times();
    let released: Vec<_> = snapshot
        .movies
        .iter()
        .filter(|m| m.has_released(as_of))
        .collect();
    let watched_movies = released
        .iter()
        .filter(|m| movie_watches.contains_key(&m.id))
        .count();
    let movies = MovieStats {
        total: u32::try_from(released.len()).unwrap_or(u32::MAX),
        watched: u32::try_from(watched_movies).unwrap_or(u32::MAX),
        percent: Percent::from_ratio(watched_movies as u64, released.len() as u64),
    };

    let mut genre_distribution: BTreeMap<String, u32> = BTreeMap::new();
    let mut service_distribution: BTreeMap<String, u32> = BTreeMap::new();
    for show in &snapshot.shows {
        bump_each(&mut genre_distribution, &show.genres);
        bump_each(&mut service_distribution, &show.services);
    }
    for movie in &snapshot.movies {
        bump_each(&mut genre_distribution, &movie.genres);
        bump_each(&mut service_distribution, &movie.services);
    }

    let mut status_distribution: BTreeMap<String, u32> = BTreeMap::new();
    for progress in &shows {
        *status_distribution
            .entry(progress.status.as_str().to_string())
            .or_insert(0) += 1;
    }

    ProfileWatchProgress {
        shows,
        show_counts,
        episodes,
        movies,
        genre_distribution,
        service_distribution,
        status_distribution,
    }
}

/// Counts each distinct value once per show/movie that carries it.
fn bump_each(distribution: &mut BTreeMap<String, u32>, values: &[String]) {
    let mut seen: Vec<&str> = Vec::with_capacity(values.len());
    for value in values {
        if seen.contains(&value.as_str()) {
            continue;
        }
        seen.push(value);
        *distribution.entry(value.clone()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Episode, Movie, Season, Show};
    use crate::event::{WatchEvent, WatchTarget};
    use crate::status::rollup_show;
    use crate::types::{EpisodeId, MovieId, ProfileId};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, hour, 0, 0).unwrap()
    }

    fn make_show(id: &str, episodes_per_season: &[u32], in_production: bool) -> Show {
        let mut next = 0u32;
        let seasons = episodes_per_season
            .iter()
            .enumerate()
            .map(|(i, count)| Season {
                number: u32::try_from(i).unwrap() + 1,
                episodes: (0..*count)
                    .map(|n| {
                        next += 1;
                        Episode {
                            id: EpisodeId::new(format!("{id}-e{next}")).unwrap(),
                            season_number: u32::try_from(i).unwrap() + 1,
                            episode_number: n + 1,
                            air_date: Some(date("2025-01-01")),
                            runtime_minutes: Some(45),
                        }
                    })
                    .collect(),
            })
            .collect();
        Show {
            id: ShowId::new(id).unwrap(),
            title: id.to_uppercase(),
            seasons,
            in_production,
            last_air_date: Some(date("2025-01-01")),
            number_of_episodes: Some(episodes_per_season.iter().sum()),
            genres: vec!["Drama".into(), "Sci-Fi".into()],
            services: vec!["NetStream".into()],
        }
    }

    fn events_for_all_episodes(show: &Show) -> Vec<WatchEvent> {
        show.episodes()
            .enumerate()
            .map(|(i, e)| WatchEvent {
                profile: ProfileId::new("p1").unwrap(),
                target: WatchTarget::Episode(e.id.clone()),
                watched_at: ts(1, 0) + chrono::Duration::hours(i64::try_from(i).unwrap()),
            })
            .collect()
    }

    fn snapshot(shows: Vec<Show>, movies: Vec<Movie>, events: Vec<WatchEvent>) -> ProfileSnapshot {
        ProfileSnapshot {
            shows,
            movies,
            show_added: BTreeMap::new(),
            movie_added: BTreeMap::new(),
            events,
            as_of: ts(28, 12),
        }
    }

    fn rollups(snap: &ProfileSnapshot) -> Vec<ShowRollup> {
        let watched = snap.episode_watch_times();
        snap.shows
            .iter()
            .map(|s| rollup_show(s, &watched, snap.as_of_date()))
            .collect()
    }

    #[test]
    fn fully_watched_show_reports_100_percent() {
        let show = make_show("a", &[10, 10], false);
        let events = events_for_all_episodes(&show);
        let snap = snapshot(vec![show], vec![], events);

        let progress = aggregate(&snap, &rollups(&snap));

        assert_eq!(progress.show_counts.watched, 1);
        assert_eq!(progress.episodes.watched, 20);
        assert_eq!(progress.episodes.aired, 20);
        assert!((progress.episodes.percent.value() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unaired_episodes_excluded_from_denominator() {
        // Show A: 2 seasons x 10 episodes, fully watched, not in production.
        // Show B: 5 episodes, 3 aired and watched, 2 unaired, in production.
        let show_a = make_show("a", &[10, 10], false);
        let mut show_b = make_show("b", &[5], true);
        for (i, e) in show_b.seasons[0].episodes.iter_mut().enumerate() {
            if i >= 3 {
                e.air_date = Some(date("2030-01-01"));
            }
        }

        let mut events = events_for_all_episodes(&show_a);
        events.extend(
            show_b
                .seasons[0]
                .episodes
                .iter()
                .take(3)
                .enumerate()
                .map(|(i, e)| WatchEvent {
                    profile: ProfileId::new("p1").unwrap(),
                    target: WatchTarget::Episode(e.id.clone()),
                    watched_at: ts(2, 0) + chrono::Duration::hours(i64::try_from(i).unwrap()),
                }),
        );

        let snap = snapshot(vec![show_a, show_b], vec![], events);
        let progress = aggregate(&snap, &rollups(&snap));

        assert_eq!(progress.show_counts.watched, 1);
        assert_eq!(progress.show_counts.up_to_date, 1);
        assert_eq!(progress.episodes.watched, 23);
        assert_eq!(progress.episodes.aired, 23);
        assert!((progress.episodes.percent.value() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_aired_watched_is_zero_percent_not_nan() {
        let show = make_show("a", &[5], false);
        let snap = snapshot(vec![show], vec![], vec![]);
        let progress = aggregate(&snap, &rollups(&snap));

        assert_eq!(progress.show_counts.not_watched, 1);
        assert!(progress.episodes.percent.value().abs() < f64::EPSILON);
    }

    #[test]
    fn empty_profile_yields_zeroed_structure() {
        let snap = snapshot(vec![], vec![], vec![]);
        let progress = aggregate(&snap, &[]);

        assert_eq!(progress.episodes.watched, 0);
        assert_eq!(progress.episodes.aired, 0);
        assert!(progress.episodes.percent.value().abs() < f64::EPSILON);
        assert_eq!(progress.movies.total, 0);
    }

    #[test]
    fn stale_show_excluded_from_episode_totals() {
        let healthy = make_show("a", &[5], false);
        let mut stale = make_show("b", &[5], false);
        stale.number_of_episodes = Some(12); // catalog disagrees

        let mut events = events_for_all_episodes(&healthy);
        events.extend(events_for_all_episodes(&stale));

        let snap = snapshot(vec![healthy, stale], vec![], events);
        let progress = aggregate(&snap, &rollups(&snap));

        // Only the healthy show contributes to totals.
        assert_eq!(progress.episodes.watched, 5);
        assert_eq!(progress.episodes.aired, 5);
        assert!(progress.shows.iter().any(|s| s.stale));
    }

    #[test]
    fn distributions_count_once_per_distinct_value() {
        let show = make_show("a", &[2], false); // Drama + Sci-Fi
        let movie = Movie {
            id: MovieId::new("m1").unwrap(),
            title: "Movie".into(),
            release_date: Some(date("2024-06-01")),
            runtime_minutes: Some(120),
            genres: vec!["Drama".into(), "Drama".into()], // duplicate value
            services: vec!["NetStream".into(), "FlixHub".into()],
        };
        let snap = snapshot(vec![show], vec![movie], vec![]);
        let progress = aggregate(&snap, &rollups(&snap));

        assert_eq!(progress.genre_distribution["Drama"], 2); // show + movie, once each
        assert_eq!(progress.genre_distribution["Sci-Fi"], 1);
        assert_eq!(progress.service_distribution["NetStream"], 2);
        assert_eq!(progress.service_distribution["FlixHub"], 1);
    }

    #[test]
    fn unreleased_movies_excluded_from_counts() {
        let movie = Movie {
            id: MovieId::new("m1").unwrap(),
            title: "Future".into(),
            release_date: Some(date("2030-01-01")),
            runtime_minutes: None,
            genres: vec![],
            services: vec![],
        };
        let snap = snapshot(vec![], vec![movie], vec![]);
        let progress = aggregate(&snap, &[]);
        assert_eq!(progress.movies.total, 0);
    }
}
