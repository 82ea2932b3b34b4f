//! Assembles analyzer outputs into the response shapes callers consume.
//!
//! Composition is pure: every function takes snapshots and returns a new
//! value. Account-level analytics re-run the analyzers over the union of the
//! profiles' events instead of merging per-profile outputs: velocity, streak,
//! and binge metrics are not additive across profiles.

use std::collections::BTreeSet;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::binge::{self, BingeConfig, BingeReport};
use crate::milestones::{self, MilestoneSummary};
use crate::progress::{self, EpisodeProgress, MovieStats, ProfileWatchProgress, WatchStatusCounts};
use crate::risk::{self, RiskAndDiscoveryReport};
use crate::snapshot::ProfileSnapshot;
use crate::status::{rollup_show, ShowRollup};
use crate::streak::{self, StreakReport};
use crate::timeline::{self, ActivityTimeline, TimelineConfig};
use crate::types::{AccountId, Percent, ProfileId};
use crate::velocity::{self, VelocityConfig, WatchVelocity};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("unknown statistics section: {0}")]
    UnknownSection(String),
}

/// Configuration shared by every analyzer invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerConfig {
    pub timeline: TimelineConfig,
    pub velocity: VelocityConfig,
    pub binge: BingeConfig,
}

/// The opt-in enhanced-statistics sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionKind {
    Timeline,
    Velocity,
    Binges,
    Streaks,
    Milestones,
    Risk,
}

impl SectionKind {
    pub const ALL: [Self; 6] = [
        Self::Timeline,
        Self::Velocity,
        Self::Binges,
        Self::Streaks,
        Self::Milestones,
        Self::Risk,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeline => "timeline",
            Self::Velocity => "velocity",
            Self::Binges => "binges",
            Self::Streaks => "streaks",
            Self::Milestones => "milestones",
            Self::Risk => "risk",
        }
    }
}

impl FromStr for SectionKind {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeline" => Ok(Self::Timeline),
            "velocity" => Ok(Self::Velocity),
            "binges" => Ok(Self::Binges),
            "streaks" => Ok(Self::Streaks),
            "milestones" => Ok(Self::Milestones),
            "risk" => Ok(Self::Risk),
            other => Err(ComposeError::UnknownSection(other.to_string())),
        }
    }
}

/// Which enhanced sections a caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionRequest(BTreeSet<SectionKind>);

impl SectionRequest {
    /// Parses a comma-separated section list, e.g. `"velocity,streaks"`.
    /// Empty input requests nothing.
    pub fn parse(input: &str) -> Result<Self, ComposeError> {
        let mut sections = BTreeSet::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            sections.insert(part.parse()?);
        }
        Ok(Self(sections))
    }

    #[must_use]
    pub fn all() -> Self {
        Self(SectionKind::ALL.into_iter().collect())
    }

    #[must_use]
    pub fn contains(&self, kind: SectionKind) -> bool {
        self.0.contains(&kind)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Three-way presence for an enhanced section. Distinguishes "you did not
/// ask" from "asked, but there is not enough data to compute it".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum Section<T> {
    Present(T),
    NotRequested,
    InsufficientData,
}

impl<T> Section<T> {
    #[must_use]
    pub const fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::NotRequested | Self::InsufficientData => None,
        }
    }
}

/// Full statistics response for one profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileStatistics {
    pub profile: ProfileId,
    pub progress: ProfileWatchProgress,
    pub timeline: Section<ActivityTimeline>,
    pub velocity: Section<WatchVelocity>,
    pub binges: Section<BingeReport>,
    pub streaks: Section<StreakReport>,
    pub milestones: Section<MilestoneSummary>,
    pub risk: Section<RiskAndDiscoveryReport>,
}

/// Full statistics response for one account.
///
/// Aggregate episode/movie numbers are sums across profiles with the percent
/// recomputed from the summed numerator and denominator, never the mean of
/// per-profile percentages. Enhanced sections are computed over the union of
/// all profile events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountStatistics {
    pub account: AccountId,
    pub profile_count: u32,
    /// Distinct shows across all profiles.
    pub unique_shows: u32,
    /// Distinct movies across all profiles.
    pub unique_movies: u32,
    pub show_counts: WatchStatusCounts,
    pub episodes: EpisodeProgress,
    pub movies: MovieStats,
    /// Per-profile statistics in profile-id order.
    pub profiles: Vec<ProfileStatistics>,
    pub timeline: Section<ActivityTimeline>,
    pub velocity: Section<WatchVelocity>,
    pub binges: Section<BingeReport>,
    pub streaks: Section<StreakReport>,
    pub milestones: Section<MilestoneSummary>,
    pub risk: Section<RiskAndDiscoveryReport>,
}

fn show_rollups(snapshot: &ProfileSnapshot) -> Vec<ShowRollup> {
    let watched = snapshot.episode_watch_times();
    let as_of = snapshot.as_of_date();
    snapshot
        .shows
        .iter()
        .map(|show| rollup_show(show, &watched, as_of))
        .collect()
}

struct Sections {
    timeline: Section<ActivityTimeline>,
    velocity: Section<WatchVelocity>,
    binges: Section<BingeReport>,
    streaks: Section<StreakReport>,
    milestones: Section<MilestoneSummary>,
    risk: Section<RiskAndDiscoveryReport>,
}

fn compute_sections(
    snapshot: &ProfileSnapshot,
    rollups: &[ShowRollup],
    request: &SectionRequest,
    config: &AnalyzerConfig,
) -> Sections {
    Sections {
        timeline: if request.contains(SectionKind::Timeline) {
            Section::Present(timeline::build(snapshot, &config.timeline))
        } else {
            Section::NotRequested
        },
        velocity: if request.contains(SectionKind::Velocity) {
            velocity::analyze(snapshot, &config.velocity, &config.timeline)
                .map_or(Section::InsufficientData, Section::Present)
        } else {
            Section::NotRequested
        },
        binges: if request.contains(SectionKind::Binges) {
            Section::Present(binge::detect(snapshot, &config.binge))
        } else {
            Section::NotRequested
        },
        streaks: if request.contains(SectionKind::Streaks) {
            Section::Present(streak::track(snapshot, &config.timeline))
        } else {
            Section::NotRequested
        },
        milestones: if request.contains(SectionKind::Milestones) {
            Section::Present(milestones::summarize(snapshot, &config.timeline))
        } else {
            Section::NotRequested
        },
        risk: if request.contains(SectionKind::Risk) {
            Section::Present(risk::analyze(snapshot, rollups))
        } else {
            Section::NotRequested
        },
    }
}

/// Composes the full statistics response for one profile.
#[must_use]
pub fn profile_statistics(
    profile: &ProfileId,
    snapshot: &ProfileSnapshot,
    request: &SectionRequest,
    config: &AnalyzerConfig,
) -> ProfileStatistics {
    let rollups = show_rollups(snapshot);
    let progress = progress::aggregate(snapshot, &rollups);
    let sections = compute_sections(snapshot, &rollups, request, config);

    ProfileStatistics {
        profile: profile.clone(),
        progress,
        timeline: sections.timeline,
        velocity: sections.velocity,
        binges: sections.binges,
        streaks: sections.streaks,
        milestones: sections.milestones,
        risk: sections.risk,
    }
}

/// Composes the full statistics response for one account.
///
/// Per-profile computations are independent and fan out in parallel; the
/// union pass waits for all of them.
#[must_use]
pub fn account_statistics(
    account: &AccountId,
    profiles: &[(ProfileId, ProfileSnapshot)],
    request: &SectionRequest,
    config: &AnalyzerConfig,
) -> AccountStatistics {
    let mut per_profile: Vec<ProfileStatistics> = profiles
        .par_iter()
        .map(|(id, snapshot)| profile_statistics(id, snapshot, request, config))
        .collect();
    per_profile.sort_by(|a, b| a.profile.cmp(&b.profile));

    let mut show_counts = WatchStatusCounts::default();
    let mut episodes_watched: u64 = 0;
    let mut episodes_aired: u64 = 0;
    let mut movies_total: u64 = 0;
    let mut movies_watched: u64 = 0;
    for stats in &per_profile {
        show_counts = show_counts.merged(stats.progress.show_counts);
        episodes_watched += u64::from(stats.progress.episodes.watched);
        episodes_aired += u64::from(stats.progress.episodes.aired);
        movies_total += u64::from(stats.progress.movies.total);
        movies_watched += u64::from(stats.progress.movies.watched);
    }

    let as_of = profiles
        .iter()
        .map(|(_, s)| s.as_of)
        .max()
        .unwrap_or_default();
    let parts: Vec<ProfileSnapshot> = profiles.iter().map(|(_, s)| s.clone()).collect();
    let union = ProfileSnapshot::union(&parts, as_of);
    let union_rollups = show_rollups(&union);
    let sections = compute_sections(&union, &union_rollups, request, config);

    AccountStatistics {
        account: account.clone(),
        profile_count: u32::try_from(profiles.len()).unwrap_or(u32::MAX),
        unique_shows: u32::try_from(union.shows.len()).unwrap_or(u32::MAX),
        unique_movies: u32::try_from(union.movies.len()).unwrap_or(u32::MAX),
        show_counts,
        episodes: EpisodeProgress {
            watched: u32::try_from(episodes_watched).unwrap_or(u32::MAX),
            aired: u32::try_from(episodes_aired).unwrap_or(u32::MAX),
            percent: Percent::from_ratio(episodes_watched, episodes_aired),
        },
        movies: MovieStats {
            total: u32::try_from(movies_total).unwrap_or(u32::MAX),
            watched: u32::try_from(movies_watched).unwrap_or(u32::MAX),
            percent: Percent::from_ratio(movies_watched, movies_total),
        },
        profiles: per_profile,
        timeline: sections.timeline,
        velocity: sections.velocity,
        binges: sections.binges,
        streaks: sections.streaks,
        milestones: sections.milestones,
        risk: sections.risk,
    }
}
