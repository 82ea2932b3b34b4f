//! Watch-streak tracking over consecutive calendar days.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::snapshot::ProfileSnapshot;
use crate::timeline::TimelineConfig;

/// A maximal run of consecutive calendar days with at least one watch event.
/// Content-type agnostic: an episode or a movie both satisfy a day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchStreak {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub length_days: u32,
}

/// Aggregate streak report for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreakReport {
    /// Length of the streak still running at the snapshot instant. A streak
    /// is current when its last active day is today or yesterday; today is
    /// pending until midnight and must not break it. Zero when no streak is
    /// current.
    pub current_days: u32,
    /// Longest streak ever, with its date range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest: Option<WatchStreak>,
    /// Number of streaks of at least seven days.
    pub week_plus_count: u32,
    /// Mean length across closed streaks (the current streak excluded).
    pub mean_closed_days: f64,
}

/// Computes streaks from the snapshot's events.
#[must_use]
pub fn track(snapshot: &ProfileSnapshot, config: &TimelineConfig) -> StreakReport {
    let today = config.local_date(snapshot.as_of);

    let mut days: Vec<NaiveDate> = snapshot
        .events
        .iter()
        .map(|e| config.local_date(e.watched_at))
        .collect();
    days.sort_unstable();
    days.dedup();

    let mut streaks: Vec<WatchStreak> = Vec::new();
    let mut start_idx = 0usize;
    for i in 1..=days.len() {
        let closes = i == days.len() || days[i] - days[i - 1] > Duration::days(1);
        if !closes {
            continue;
        }
        let start = days[start_idx];
        let end = days[i - 1];
        start_idx = i;
        let length = u32::try_from((end - start).num_days() + 1).unwrap_or(u32::MAX);
        streaks.push(WatchStreak {
            start,
            end,
            length_days: length,
        });
    }

    let yesterday = today - Duration::days(1);
    let current = streaks
        .last()
        .filter(|s| s.end == today || s.end == yesterday)
        .cloned();
    let current_days = current.as_ref().map_or(0, |s| s.length_days);

    let longest = streaks
        .iter()
        .max_by(|a, b| a.length_days.cmp(&b.length_days).then(a.end.cmp(&b.end)))
        .cloned();

    let week_plus_count = u32::try_from(
        streaks.iter().filter(|s| s.length_days >= 7).count(),
    )
    .unwrap_or(u32::MAX);

    let closed: Vec<&WatchStreak> = streaks
        .iter()
        .filter(|s| current.as_ref() != Some(*s))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let mean_closed_days = if closed.is_empty() {
        0.0
    } else {
        closed.iter().map(|s| u64::from(s.length_days)).sum::<u64>() as f64
            / closed.len() as f64
    };

    StreakReport {
        current_days,
        longest,
        week_plus_count,
        mean_closed_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{WatchEvent, WatchTarget};
    use crate::types::{EpisodeId, MovieId, ProfileId};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn episode_event(id: &str, at: DateTime<Utc>) -> WatchEvent {
        WatchEvent {
            profile: ProfileId::new("p1").unwrap(),
            target: WatchTarget::Episode(EpisodeId::new(id).unwrap()),
            watched_at: at,
        }
    }

    fn movie_event(id: &str, at: DateTime<Utc>) -> WatchEvent {
        WatchEvent {
            profile: ProfileId::new("p1").unwrap(),
            target: WatchTarget::Movie(MovieId::new(id).unwrap()),
            watched_at: at,
        }
    }

    fn day(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, hour, 0, 0).unwrap()
    }

    fn snapshot(events: Vec<WatchEvent>) -> ProfileSnapshot {
        ProfileSnapshot {
            shows: vec![],
            movies: vec![],
            show_added: BTreeMap::new(),
            movie_added: BTreeMap::new(),
            events,
            as_of: day(10, 12),
        }
    }

    #[test]
    fn consecutive_days_form_one_streak() {
        let snap = snapshot(vec![
            episode_event("e1", day(8, 20)),
            episode_event("e2", day(9, 20)),
            episode_event("e3", day(10, 9)),
        ]);
        let report = track(&snap, &TimelineConfig::default());
        assert_eq!(report.current_days, 3);
        assert_eq!(report.longest.unwrap().length_days, 3);
    }

    #[test]
    fn streak_ending_yesterday_is_still_current() {
        let snap = snapshot(vec![
            episode_event("e1", day(8, 20)),
            episode_event("e2", day(9, 20)),
        ]);
        let report = track(&snap, &TimelineConfig::default());
        assert_eq!(report.current_days, 2);
    }

    #[test]
    fn two_day_gap_breaks_the_current_streak() {
        let snap = snapshot(vec![
            episode_event("e1", day(6, 20)),
            episode_event("e2", day(7, 20)),
            episode_event("e3", day(8, 20)),
        ]);
        // as_of is March 10; last activity March 8, so closed.
        let report = track(&snap, &TimelineConfig::default());
        assert_eq!(report.current_days, 0);
        assert_eq!(report.longest.unwrap().length_days, 3);
        assert!((report.mean_closed_days - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn content_type_is_irrelevant_to_streaks() {
        // One episode and zero movies on a day counts identically to zero
        // episodes and one movie.
        let with_episode = snapshot(vec![
            episode_event("e1", day(9, 20)),
            episode_event("e2", day(10, 9)),
        ]);
        let with_movie = snapshot(vec![
            movie_event("m1", day(9, 20)),
            episode_event("e2", day(10, 9)),
        ]);
        let a = track(&with_episode, &TimelineConfig::default());
        let b = track(&with_movie, &TimelineConfig::default());
        assert_eq!(a.current_days, b.current_days);
        assert_eq!(a.current_days, 2);
    }

    #[test]
    fn multiple_events_on_one_day_count_once() {
        let snap = snapshot(vec![
            episode_event("e1", day(10, 9)),
            episode_event("e2", day(10, 10)),
            episode_event("e3", day(10, 11)),
        ]);
        let report = track(&snap, &TimelineConfig::default());
        assert_eq!(report.current_days, 1);
    }

    #[test]
    fn week_plus_streaks_counted() {
        let mut events = Vec::new();
        for d in 1..=8 {
            events.push(episode_event(&format!("e{d}"), day(d, 20)));
        }
        let snap = snapshot(events);
        let report = track(&snap, &TimelineConfig::default());
        assert_eq!(report.week_plus_count, 1);
        assert_eq!(report.current_days, 0); // ended March 8, today is March 10
        assert!((report.mean_closed_days - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_events_yields_zeroed_report() {
        let report = track(&snapshot(vec![]), &TimelineConfig::default());
        assert_eq!(report.current_days, 0);
        assert!(report.longest.is_none());
        assert_eq!(report.week_plus_count, 0);
    }
}
