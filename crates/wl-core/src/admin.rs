//! Platform-wide statistics across every account.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::WatchTarget;
use crate::risk;
use crate::snapshot::ProfileSnapshot;
use crate::status::{rollup_show, ShowRollup};
use crate::types::{AccountId, MovieId, Percent, ProfileId, ShowId};

/// Trailing window used for "active" and "trending" figures, in days.
const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// One account's profiles and their snapshots, as loaded from the store.
#[derive(Debug, Clone)]
pub struct AccountProfiles {
    pub account: AccountId,
    pub profiles: Vec<(ProfileId, ProfileSnapshot)>,
}

impl AccountProfiles {
    fn union(&self) -> ProfileSnapshot {
        let as_of = self
            .profiles
            .iter()
            .map(|(_, s)| s.as_of)
            .max()
            .unwrap_or_default();
        let parts: Vec<ProfileSnapshot> = self.profiles.iter().map(|(_, s)| s.clone()).collect();
        ProfileSnapshot::union(&parts, as_of)
    }
}

/// Headline numbers for the whole platform.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformOverview {
    pub account_count: u32,
    pub profile_count: u32,
    pub total_watch_events: u64,
    /// Events recorded in the trailing 30 days, platform-wide.
    pub events_last_30_days: u64,
    /// Accounts with at least one event in the trailing 30 days.
    pub active_accounts: u32,
    pub distinct_shows: u32,
    pub distinct_movies: u32,
}

/// One account's health and activity figures, used for ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountHealth {
    pub account: AccountId,
    pub profile_count: u32,
    pub total_events: u64,
    pub events_last_30_days: u64,
    /// Shows in `Watching` with 30+ idle days, across the account union.
    pub at_risk_shows: u32,
    pub abandonment_rate: Percent,
}

/// Platform-wide popularity of one show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowPopularity {
    pub show: ShowId,
    pub title: String,
    /// Profiles with at least one event for the show.
    pub watching_profiles: u32,
    pub total_events: u64,
    /// Events in the trailing 30 days, for trending.
    pub events_last_30_days: u64,
}

/// Platform-wide popularity of one movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoviePopularity {
    pub movie: MovieId,
    pub title: String,
    pub watching_profiles: u32,
    pub events_last_30_days: u64,
}

/// Content popularity and trending report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentReport {
    /// Shows ranked by watching profiles, then total events.
    pub shows: Vec<ShowPopularity>,
    /// Movies ranked by watching profiles.
    pub movies: Vec<MoviePopularity>,
    /// Shows ranked by trailing-30-day events; inactive shows omitted.
    pub trending_shows: Vec<ShowPopularity>,
}

fn window_start(accounts: &[AccountProfiles]) -> DateTime<Utc> {
    let as_of = accounts
        .iter()
        .flat_map(|a| a.profiles.iter().map(|(_, s)| s.as_of))
        .max()
        .unwrap_or_default();
    as_of - Duration::days(ACTIVITY_WINDOW_DAYS)
}

/// Computes the platform overview across all accounts.
#[must_use]
pub fn platform_overview(accounts: &[AccountProfiles]) -> PlatformOverview {
    let recent = window_start(accounts);

    let mut overview = PlatformOverview::default();
    let mut shows: HashSet<&ShowId> = HashSet::new();
    let mut movies: HashSet<&MovieId> = HashSet::new();

    for account in accounts {
        overview.account_count += 1;
        let mut account_recent = 0u64;
        for (_, snapshot) in &account.profiles {
            overview.profile_count += 1;
            overview.total_watch_events += snapshot.events.len() as u64;
            account_recent += snapshot
                .events
                .iter()
                .filter(|e| e.watched_at >= recent)
                .count() as u64;
            shows.extend(snapshot.shows.iter().map(|s| &s.id));
            movies.extend(snapshot.movies.iter().map(|m| &m.id));
        }
        overview.events_last_30_days += account_recent;
        if account_recent > 0 {
            overview.active_accounts += 1;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    {
        overview.distinct_shows = shows.len() as u32;
        overview.distinct_movies = movies.len() as u32;
    }
    overview
}

/// Ranks accounts by trailing-30-day activity, most active first.
/// Risk figures come from each account's union snapshot.
#[must_use]
pub fn account_rankings(accounts: &[AccountProfiles]) -> Vec<AccountHealth> {
    let recent = window_start(accounts);

    let mut rankings: Vec<AccountHealth> = accounts
        .par_iter()
        .map(|account| {
            let union = account.union();
            let watched = union.episode_watch_times();
            let as_of = union.as_of_date();
            let rollups: Vec<ShowRollup> = union
                .shows
                .iter()
                .map(|show| rollup_show(show, &watched, as_of))
                .collect();
            let report = risk::analyze(&union, &rollups);

            let events_last_30_days = union
                .events
                .iter()
                .filter(|e| e.watched_at >= recent)
                .count();
            AccountHealth {
                account: account.account.clone(),
                profile_count: u32::try_from(account.profiles.len()).unwrap_or(u32::MAX),
                total_events: union.events.len() as u64,
                events_last_30_days: events_last_30_days as u64,
                at_risk_shows: u32::try_from(report.at_risk.len()).unwrap_or(u32::MAX),
                abandonment_rate: report.abandonment_rate,
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.events_last_30_days
            .cmp(&a.events_last_30_days)
            .then(b.total_events.cmp(&a.total_events))
            .then(a.account.cmp(&b.account))
    });
    rankings
}

/// Computes content popularity and trending across all accounts.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn content_report(accounts: &[AccountProfiles]) -> ContentReport {
    let recent = window_start(accounts);

    struct ShowTally {
        title: String,
        profiles: HashSet<ProfileId>,
        total_events: u64,
        recent_events: u64,
    }
    struct MovieTally {
        title: String,
        profiles: HashSet<ProfileId>,
        recent_events: u64,
    }

    let mut show_tallies: BTreeMap<ShowId, ShowTally> = BTreeMap::new();
    let mut movie_tallies: BTreeMap<MovieId, MovieTally> = BTreeMap::new();

    for account in accounts {
        for (profile, snapshot) in &account.profiles {
            let show_index: HashMap<_, _> = snapshot.episode_show_index();
            let titles: HashMap<&ShowId, &str> = snapshot
                .shows
                .iter()
                .map(|s| (&s.id, s.title.as_str()))
                .collect();
            let movie_titles: HashMap<&MovieId, &str> = snapshot
                .movies
                .iter()
                .map(|m| (&m.id, m.title.as_str()))
                .collect();

            for event in &snapshot.events {
                match &event.target {
                    WatchTarget::Episode(id) => {
                        let Some(show) = show_index.get(id) else {
                            continue;
                        };
                        let tally =
                            show_tallies
                                .entry(ShowId::clone(*show))
                                .or_insert_with(|| ShowTally {
                                    title: titles.get(*show).map_or_else(
                                        || (*show).as_str().to_string(),
                                        ToString::to_string,
                                    ),
                                    profiles: HashSet::new(),
                                    total_events: 0,
                                    recent_events: 0,
                                });
                        tally.profiles.insert(profile.clone());
                        tally.total_events += 1;
                        if event.watched_at >= recent {
                            tally.recent_events += 1;
                        }
                    }
                    WatchTarget::Movie(id) => {
                        let tally =
                            movie_tallies
                                .entry(id.clone())
                                .or_insert_with(|| MovieTally {
                                    title: movie_titles.get(id).map_or_else(
                                        || id.as_str().to_string(),
                                        ToString::to_string,
                                    ),
                                    profiles: HashSet::new(),
                                    recent_events: 0,
                                });
                        tally.profiles.insert(profile.clone());
                        if event.watched_at >= recent {
                            tally.recent_events += 1;
                        }
                    }
                }
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut shows: Vec<ShowPopularity> = show_tallies
        .iter()
        .map(|(id, tally)| ShowPopularity {
            show: id.clone(),
            title: tally.title.clone(),
            watching_profiles: tally.profiles.len() as u32,
            total_events: tally.total_events,
            events_last_30_days: tally.recent_events,
        })
        .collect();
    shows.sort_by(|a, b| {
        b.watching_profiles
            .cmp(&a.watching_profiles)
            .then(b.total_events.cmp(&a.total_events))
            .then(a.show.cmp(&b.show))
    });

    #[allow(clippy::cast_possible_truncation)]
    let mut movies: Vec<MoviePopularity> = movie_tallies
        .iter()
        .map(|(id, tally)| MoviePopularity {
            movie: id.clone(),
            title: tally.title.clone(),
            watching_profiles: tally.profiles.len() as u32,
            events_last_30_days: tally.recent_events,
        })
        .collect();
    movies.sort_by(|a, b| {
        b.watching_profiles
            .cmp(&a.watching_profiles)
            .then(a.movie.cmp(&b.movie))
    });

    let mut trending_shows: Vec<ShowPopularity> = shows
        .iter()
        .filter(|s| s.events_last_30_days > 0)
        .cloned()
        .collect();
    trending_shows.sort_by(|a, b| {
        b.events_last_30_days
            .cmp(&a.events_last_30_days)
            .then(a.show.cmp(&b.show))
    });

    ContentReport {
        shows,
        movies,
        trending_shows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Episode, Season, Show};
    use crate::event::WatchEvent;
    use crate::types::EpisodeId;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn make_show(id: &str, episodes: u32) -> Show {
        Show {
            id: ShowId::new(id).unwrap(),
            title: id.to_uppercase(),
            seasons: vec![Season {
                number: 1,
                episodes: (1..=episodes)
                    .map(|n| Episode {
                        id: EpisodeId::new(format!("{id}-e{n}")).unwrap(),
                        season_number: 1,
                        episode_number: n,
                        air_date: Some("2025-01-01".parse().unwrap()),
                        runtime_minutes: Some(40),
                    })
                    .collect(),
            }],
            in_production: false,
            last_air_date: None,
            number_of_episodes: Some(episodes),
            genres: vec![],
            services: vec![],
        }
    }

    fn account(
        id: &str,
        profiles: Vec<(&str, Vec<(&str, i64)>)>,
        shows: Vec<Show>,
    ) -> AccountProfiles {
        AccountProfiles {
            account: AccountId::new(id).unwrap(),
            profiles: profiles
                .into_iter()
                .map(|(pid, events)| {
                    let profile = ProfileId::new(pid).unwrap();
                    let mut events: Vec<WatchEvent> = events
                        .into_iter()
                        .map(|(episode, days_ago)| WatchEvent {
                            profile: profile.clone(),
                            target: WatchTarget::Episode(EpisodeId::new(episode).unwrap()),
                            watched_at: as_of() - Duration::days(days_ago),
                        })
                        .collect();
                    events.sort_by_key(|e| e.watched_at);
                    (
                        profile,
                        ProfileSnapshot {
                            shows: shows.clone(),
                            movies: vec![],
                            show_added: BTreeMap::new(),
                            movie_added: BTreeMap::new(),
                            events,
                            as_of: as_of(),
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn overview_counts_active_accounts_in_window() {
        let shows = vec![make_show("a", 5)];
        let accounts = vec![
            account("acct1", vec![("p1", vec![("a-e1", 5)])], shows.clone()),
            account("acct2", vec![("p2", vec![("a-e1", 60)])], shows),
        ];
        let overview = platform_overview(&accounts);

        assert_eq!(overview.account_count, 2);
        assert_eq!(overview.profile_count, 2);
        assert_eq!(overview.total_watch_events, 2);
        assert_eq!(overview.events_last_30_days, 1);
        assert_eq!(overview.active_accounts, 1);
        assert_eq!(overview.distinct_shows, 1);
    }

    #[test]
    fn rankings_order_by_recent_activity() {
        let shows = vec![make_show("a", 5)];
        let accounts = vec![
            account("quiet", vec![("p1", vec![("a-e1", 60)])], shows.clone()),
            account(
                "busy",
                vec![("p2", vec![("a-e1", 1), ("a-e2", 2)])],
                shows,
            ),
        ];
        let rankings = account_rankings(&accounts);

        assert_eq!(rankings[0].account.as_str(), "busy");
        assert_eq!(rankings[0].events_last_30_days, 2);
        assert_eq!(rankings[1].events_last_30_days, 0);
    }

    #[test]
    fn content_report_ranks_by_watching_profiles() {
        let shows = vec![make_show("a", 5), make_show("b", 5)];
        let accounts = vec![
            account(
                "acct1",
                vec![
                    ("p1", vec![("a-e1", 1), ("b-e1", 1)]),
                    ("p2", vec![("a-e1", 2)]),
                ],
                shows.clone(),
            ),
            account("acct2", vec![("p3", vec![("a-e1", 40)])], shows),
        ];
        let report = content_report(&accounts);

        assert_eq!(report.shows[0].show.as_str(), "a");
        assert_eq!(report.shows[0].watching_profiles, 3);
        assert_eq!(report.shows[0].events_last_30_days, 2);
        assert_eq!(report.shows[1].watching_profiles, 1);
        assert_eq!(report.trending_shows.len(), 2);
        assert_eq!(report.trending_shows[0].show.as_str(), "a");
    }
}
