//! Milestone thresholds and achievement emission.
//!
//! Cumulative totals are tracked against fixed threshold ladders, and
//! achievements are emitted for threshold crossings and semantic firsts.
//! Every achievement is keyed by a stable (kind, value, subject) tuple so
//! recomputation over the same event set never emits duplicates.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::binge::BingeConfig;
use crate::event::WatchTarget;
use crate::snapshot::ProfileSnapshot;
use crate::status::{WatchStatus, rollup_show};
use crate::timeline::TimelineConfig;
use crate::types::Percent;

/// Episode-count thresholds.
pub const EPISODE_THRESHOLDS: &[u64] = &[100, 500, 1_000, 5_000];
/// Movie-count thresholds.
pub const MOVIE_THRESHOLDS: &[u64] = &[10, 50, 100, 500];
/// Estimated-hours-watched thresholds.
pub const HOUR_THRESHOLDS: &[u64] = &[100, 500, 1_000, 10_000];
/// Streak-length thresholds, in days.
pub const STREAK_THRESHOLDS: &[u64] = &[7, 30, 100];
/// Binge-session-count thresholds.
pub const BINGE_THRESHOLDS: &[u64] = &[10, 50, 100];

/// What an achievement commemorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    FirstEpisode,
    FirstMovie,
    ShowCompleted,
    EpisodeCount,
    MovieCount,
    HoursWatched,
    StreakDays,
    BingeSessions,
}

impl AchievementKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FirstEpisode => "first_episode",
            Self::FirstMovie => "first_movie",
            Self::ShowCompleted => "show_completed",
            Self::EpisodeCount => "episode_count",
            Self::MovieCount => "movie_count",
            Self::HoursWatched => "hours_watched",
            Self::StreakDays => "streak_days",
            Self::BingeSessions => "binge_sessions",
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A one-time achievement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Achievement {
    pub kind: AchievementKind,
    /// Threshold value for count-based kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
    /// Subject entity for per-content kinds (e.g. the completed show's ID).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub achieved_at: DateTime<Utc>,
}

impl Achievement {
    /// Stable dedup key; identical across recomputations.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.kind,
            self.value.map_or_else(String::new, |v| v.to_string()),
            self.subject.as_deref().unwrap_or("")
        )
    }
}

/// Progress toward the next threshold on one ladder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MilestoneProgress {
    pub current: u64,
    /// Next unreached threshold; `None` when the ladder is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_threshold: Option<u64>,
    /// Percent of the way to the next threshold (100 when exhausted).
    pub percent_to_next: Percent,
    /// Thresholds already achieved.
    pub achieved: Vec<u64>,
}

impl MilestoneProgress {
    fn against(current: u64, ladder: &[u64]) -> Self {
        let achieved: Vec<u64> = ladder.iter().copied().filter(|t| current >= *t).collect();
        let next_threshold = ladder.iter().copied().find(|t| current < *t);
        let percent_to_next = next_threshold
            .map_or(Percent::MAX, |t| Percent::from_ratio(current, t));
        Self {
            current,
            next_threshold,
            percent_to_next,
            achieved,
        }
    }
}

/// Milestone summary for one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MilestoneSummary {
    pub episodes: MilestoneProgress,
    pub movies: MilestoneProgress,
    /// Estimated hours watched: Σ runtime / 60 over watched items. Items
    /// with unknown runtime contribute nothing.
    pub hours: MilestoneProgress,
    /// Achievements in key order.
    pub achievements: Vec<Achievement>,
}

/// Computes milestone progress and achievements.
#[must_use]
pub fn summarize(snapshot: &ProfileSnapshot, timeline_config: &TimelineConfig) -> MilestoneSummary {
    let runtimes = snapshot.runtime_index();

    let mut episode_count: u64 = 0;
    let mut movie_count: u64 = 0;
    let mut runtime_minutes: u64 = 0;
    let mut seen: HashSet<&WatchTarget> = HashSet::new();
    // Keyed map guarantees dedup and deterministic ordering.
    let mut achievements: BTreeMap<String, Achievement> = BTreeMap::new();

    let push = |map: &mut BTreeMap<String, Achievement>, a: Achievement| {
        map.entry(a.key()).or_insert(a);
    };

    for event in &snapshot.events {
        // First watch of a target counts; re-watches do not advance ladders.
        if !seen.insert(&event.target) {
            continue;
        }
        match &event.target {
            WatchTarget::Episode(_) => {
                episode_count += 1;
                if episode_count == 1 {
                    push(
                        &mut achievements,
                        Achievement {
                            kind: AchievementKind::FirstEpisode,
                            value: None,
                            subject: None,
                            achieved_at: event.watched_at,
                        },
                    );
                }
                if EPISODE_THRESHOLDS.contains(&episode_count) {
                    push(
                        &mut achievements,
                        Achievement {
                            kind: AchievementKind::EpisodeCount,
                            value: Some(episode_count),
                            subject: None,
                            achieved_at: event.watched_at,
                        },
                    );
                }
            }
            WatchTarget::Movie(_) => {
                movie_count += 1;
                if movie_count == 1 {
                    push(
                        &mut achievements,
                        Achievement {
                            kind: AchievementKind::FirstMovie,
                            value: None,
                            subject: None,
                            achieved_at: event.watched_at,
                        },
                    );
                }
                if MOVIE_THRESHOLDS.contains(&movie_count) {
                    push(
                        &mut achievements,
                        Achievement {
                            kind: AchievementKind::MovieCount,
                            value: Some(movie_count),
                            subject: None,
                            achieved_at: event.watched_at,
                        },
                    );
                }
            }
        }

        if let Some(minutes) = runtimes.get(&event.target) {
            let before = runtime_minutes / 60;
            runtime_minutes += u64::from(*minutes);
            let after = runtime_minutes / 60;
            for threshold in HOUR_THRESHOLDS {
                if before < *threshold && after >= *threshold {
                    push(
                        &mut achievements,
                        Achievement {
                            kind: AchievementKind::HoursWatched,
                            value: Some(*threshold),
                            subject: None,
                            achieved_at: event.watched_at,
                        },
                    );
                }
            }
        }
    }

    // Show completions: achieved at the event that watched the last episode.
    let watched = snapshot.episode_watch_times();
    let as_of = snapshot.as_of_date();
    for show in &snapshot.shows {
        let rollup = rollup_show(show, &watched, as_of);
        if rollup.status == WatchStatus::Watched && !rollup.stale {
            if let Some(completed_at) = show.episodes().filter_map(|e| watched.get(&e.id)).max() {
                push(
                    &mut achievements,
                    Achievement {
                        kind: AchievementKind::ShowCompleted,
                        value: None,
                        subject: Some(show.id.to_string()),
                        achieved_at: *completed_at,
                    },
                );
            }
        }
    }

    // Streak and binge milestones.
    let streaks = crate::streak::track(snapshot, timeline_config);
    if let Some(longest) = &streaks.longest {
        for threshold in STREAK_THRESHOLDS {
            if u64::from(longest.length_days) >= *threshold {
                push(
                    &mut achievements,
                    Achievement {
                        kind: AchievementKind::StreakDays,
                        value: Some(*threshold),
                        subject: None,
                        achieved_at: snapshot.as_of,
                    },
                );
            }
        }
    }
    let binges = crate::binge::detect(snapshot, &BingeConfig::default());
    for threshold in BINGE_THRESHOLDS {
        if u64::from(binges.session_count) >= *threshold {
            push(
                &mut achievements,
                Achievement {
                    kind: AchievementKind::BingeSessions,
                    value: Some(*threshold),
                    subject: None,
                    achieved_at: snapshot.as_of,
                },
            );
        }
    }

    MilestoneSummary {
        episodes: MilestoneProgress::against(episode_count, EPISODE_THRESHOLDS),
        movies: MilestoneProgress::against(movie_count, MOVIE_THRESHOLDS),
        hours: MilestoneProgress::against(runtime_minutes / 60, HOUR_THRESHOLDS),
        achievements: achievements.into_values().collect(),
    }
}
