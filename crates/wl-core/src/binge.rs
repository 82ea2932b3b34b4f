//! Binge-session detection.
//!
//! A binge session is a maximal run of watch events where consecutive
//! events are less than the gap limit apart and the run reaches the minimum
//! length. Sessions are built by a single chronological pass that greedily
//! extends the current run; a too-large gap closes it, and runs below the
//! minimum are discarded rather than reported.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::ProfileSnapshot;
use crate::types::ShowId;

/// Binge detection configuration.
#[derive(Debug, Clone, Copy)]
pub struct BingeConfig {
    /// Maximum gap between consecutive events within a session, in hours.
    /// A gap of exactly this many hours closes the session. Default: 24.
    pub max_gap_hours: i64,
    /// Minimum events for a run to count as a binge. Default: 3.
    pub min_events: usize,
}

impl Default for BingeConfig {
    fn default() -> Self {
        Self {
            max_gap_hours: 24,
            min_events: 3,
        }
    }
}

/// A detected binge session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BingeSession {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Events in the session (episodes and movies both count).
    pub event_count: u32,
    /// Distinct shows appearing in the session, in id order.
    pub shows: Vec<ShowId>,
}

/// Aggregate binge report for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BingeReport {
    pub session_count: u32,
    pub mean_events_per_session: f64,
    /// Longest session by event count; ties break toward the most recent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest: Option<BingeSession>,
    /// Shows ranked by the number of sessions they appear in (top five).
    pub top_shows: Vec<ShowSessionCount>,
}

/// How many sessions a show appeared in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowSessionCount {
    pub show: ShowId,
    pub sessions: u32,
}

/// Detects binge sessions over the snapshot's events.
///
/// Events are already sorted by `watched_at`; the pass is O(n).
#[must_use]
pub fn detect(snapshot: &ProfileSnapshot, config: &BingeConfig) -> BingeReport {
    let show_index = snapshot.episode_show_index();
    let max_gap = Duration::hours(config.max_gap_hours);
    let events = &snapshot.events;

    let mut sessions: Vec<BingeSession> = Vec::new();
    let mut run_start = 0usize;

    for i in 1..=events.len() {
        let closes = i == events.len()
            || events[i].watched_at - events[i - 1].watched_at >= max_gap;
        if !closes {
            continue;
        }
        let run = &events[run_start..i];
        run_start = i;
        if run.len() < config.min_events {
            continue;
        }
        let mut shows: Vec<ShowId> = run
            .iter()
            .filter_map(|e| e.target.as_episode())
            .filter_map(|id| show_index.get(id))
            .map(|show| (*show).clone())
            .collect();
        shows.sort_unstable();
        shows.dedup();
        sessions.push(BingeSession {
            started_at: run[0].watched_at,
            ended_at: run[run.len() - 1].watched_at,
            event_count: u32::try_from(run.len()).unwrap_or(u32::MAX),
            shows,
        });
    }

    let session_count = u32::try_from(sessions.len()).unwrap_or(u32::MAX);
    #[allow(clippy::cast_precision_loss)]
    let mean_events_per_session = if sessions.is_empty() {
        0.0
    } else {
        sessions.iter().map(|s| u64::from(s.event_count)).sum::<u64>() as f64
            / sessions.len() as f64
    };

    let longest = sessions
        .iter()
        .max_by(|a, b| {
            a.event_count
                .cmp(&b.event_count)
                .then(a.ended_at.cmp(&b.ended_at))
        })
        .cloned();

    let mut session_counts: BTreeMap<&ShowId, u32> = BTreeMap::new();
    for session in &sessions {
        for show in &session.shows {
            *session_counts.entry(show).or_insert(0) += 1;
        }
    }
    let mut top_shows: Vec<ShowSessionCount> = session_counts
        .into_iter()
        .map(|(show, sessions)| ShowSessionCount {
            show: show.clone(),
            sessions,
        })
        .collect();
    top_shows.sort_by(|a, b| b.sessions.cmp(&a.sessions).then(a.show.cmp(&b.show)));
    top_shows.truncate(5);

    BingeReport {
        session_count,
        mean_events_per_session,
        longest,
        top_shows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{WatchEvent, WatchTarget};
    use crate::types::{EpisodeId, ProfileId};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn event(id: &str, at: DateTime<Utc>) -> WatchEvent {
        WatchEvent {
            profile: ProfileId::new("p1").unwrap(),
            target: WatchTarget::Episode(EpisodeId::new(id).unwrap()),
            watched_at: at,
        }
    }

    fn snapshot(events: Vec<WatchEvent>) -> ProfileSnapshot {
        ProfileSnapshot {
            shows: vec![],
            movies: vec![],
            show_added: BTreeMap::new(),
            movie_added: BTreeMap::new(),
            events,
            as_of: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap(),
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn three_close_events_form_a_session() {
        let snap = snapshot(vec![
            event("e1", at(1, 9)),
            event("e2", at(1, 10)),
            event("e3", at(1, 11)),
        ]);
        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.session_count, 1);
        assert_eq!(report.longest.unwrap().event_count, 3);
    }

    #[test]
    fn two_events_are_not_a_binge() {
        // A run of exactly 2 events within 1 hour is NOT a binge.
        let snap = snapshot(vec![event("e1", at(1, 9)), event("e2", at(1, 10))]);
        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.session_count, 0);
        assert!(report.longest.is_none());
        assert!((report.mean_events_per_session).abs() < f64::EPSILON);
    }

    #[test]
    fn gap_of_24_hours_or_more_splits_sessions() {
        // Four events at 09:00, 10:00, 11:00, then next day +12h (36:00):
        // the first three form one binge, the fourth starts a run of 1.
        let snap = snapshot(vec![
            event("e1", at(1, 9)),
            event("e2", at(1, 10)),
            event("e3", at(1, 11)),
            event("e4", at(2, 12)),
        ]);
        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.session_count, 1);
        assert_eq!(report.longest.unwrap().event_count, 3);
    }

    #[test]
    fn gap_just_under_limit_extends_the_session() {
        let snap = snapshot(vec![
            event("e1", at(1, 9)),
            event("e2", at(2, 8)), // 23h later
            event("e3", at(3, 7)), // 23h later
        ]);
        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.session_count, 1);
    }

    #[test]
    fn longest_ties_break_toward_most_recent() {
        let snap = snapshot(vec![
            event("a1", at(1, 9)),
            event("a2", at(1, 10)),
            event("a3", at(1, 11)),
            // ≥24h gap, then a second 3-event session
            event("b1", at(5, 9)),
            event("b2", at(5, 10)),
            event("b3", at(5, 11)),
        ]);
        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.session_count, 2);
        assert_eq!(report.longest.unwrap().ended_at, at(5, 11));
        assert!((report.mean_events_per_session - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shows_ranked_by_session_appearances() {
        use crate::catalog::{Episode, Season, Show};

        let make_show = |sid: &str, eps: &[&str]| Show {
            id: ShowId::new(sid).unwrap(),
            title: sid.to_uppercase(),
            seasons: vec![Season {
                number: 1,
                episodes: eps
                    .iter()
                    .enumerate()
                    .map(|(i, e)| Episode {
                        id: EpisodeId::new(*e).unwrap(),
                        season_number: 1,
                        episode_number: u32::try_from(i).unwrap() + 1,
                        air_date: Some("2025-01-01".parse().unwrap()),
                        runtime_minutes: None,
                    })
                    .collect(),
            }],
            in_production: false,
            last_air_date: None,
            number_of_episodes: None,
            genres: vec![],
            services: vec![],
        };

        let mut snap = snapshot(vec![
            // Session 1: show-a only
            event("a1", at(1, 9)),
            event("a2", at(1, 10)),
            event("a3", at(1, 11)),
            // Session 2: show-a and show-b
            event("a4", at(5, 9)),
            event("b1", at(5, 10)),
            event("b2", at(5, 11)),
        ]);
        snap.shows = vec![
            make_show("show-a", &["a1", "a2", "a3", "a4"]),
            make_show("show-b", &["b1", "b2"]),
        ];

        let report = detect(&snap, &BingeConfig::default());
        assert_eq!(report.top_shows.len(), 2);
        assert_eq!(report.top_shows[0].show.as_str(), "show-a");
        assert_eq!(report.top_shows[0].sessions, 2);
        assert_eq!(report.top_shows[1].sessions, 1);
    }
}
