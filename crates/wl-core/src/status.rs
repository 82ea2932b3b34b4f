//! Watch status vocabularies and the hierarchical status rollup.
//!
//! Two status domains exist and are kept as distinct types:
//!
//! - [`BinaryWatchStatus`] for atomic units (episodes, movies): watched or
//!   not, nothing else.
//! - [`WatchStatus`] for aggregating units (seasons, shows): five states
//!   including `Watching`, `UpToDate`, and `Unaired`.
//!
//! Widening from binary to full is always valid; narrowing is a fallible
//! conversion performed explicitly at the boundary. A season or show status
//! is a deterministic pure function of episode-level watch facts and air
//! dates: recomputing from the same inputs always yields the same status.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Season, Show};
use crate::types::EpisodeId;

/// Binary status for atomic, non-aggregating content (episodes, movies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BinaryWatchStatus {
    #[default]
    NotWatched,
    Watched,
}

impl BinaryWatchStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotWatched => "not_watched",
            Self::Watched => "watched",
        }
    }
}

impl fmt::Display for BinaryWatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full five-state status for aggregating content (seasons, shows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    /// No aired content exists yet.
    Unaired,
    /// Aired content exists but none of it has been watched.
    #[default]
    NotWatched,
    /// Some aired content watched, some remaining.
    Watching,
    /// Everything watched and nothing more coming.
    Watched,
    /// All released content watched, but more is scheduled or in production.
    UpToDate,
}

impl WatchStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unaired => "unaired",
            Self::NotWatched => "not_watched",
            Self::Watching => "watching",
            Self::Watched => "watched",
            Self::UpToDate => "up_to_date",
        }
    }

    /// Narrows to the binary vocabulary.
    ///
    /// Returns `None` for the three states that have no binary counterpart;
    /// atomic entities must never hold them.
    #[must_use]
    pub const fn narrow(self) -> Option<BinaryWatchStatus> {
        match self {
            Self::NotWatched => Some(BinaryWatchStatus::NotWatched),
            Self::Watched => Some(BinaryWatchStatus::Watched),
            Self::Unaired | Self::Watching | Self::UpToDate => None,
        }
    }

    /// Whether this is a terminal state (nothing left to watch right now).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Watched | Self::UpToDate)
    }
}

impl From<BinaryWatchStatus> for WatchStatus {
    fn from(status: BinaryWatchStatus) -> Self {
        match status {
            BinaryWatchStatus::NotWatched => Self::NotWatched,
            BinaryWatchStatus::Watched => Self::Watched,
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unaired" => Ok(Self::Unaired),
            "not_watched" => Ok(Self::NotWatched),
            "watching" => Ok(Self::Watching),
            "watched" => Ok(Self::Watched),
            "up_to_date" => Ok(Self::UpToDate),
            _ => Err(format!("invalid watch status: {s}")),
        }
    }
}

/// Reference to an episode within its show, for last-watched / next-to-watch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeRef {
    pub episode: EpisodeId,
    pub season_number: u32,
    pub episode_number: u32,
}

/// Derived per-profile status and counts for one season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonRollup {
    pub season_number: u32,
    pub status: WatchStatus,
    /// Episodes watched (only aired episodes are ever counted as watched).
    pub watched_episodes: u32,
    /// Episodes that have aired as of the rollup date.
    pub aired_episodes: u32,
    /// All episodes recorded locally, aired or not.
    pub total_episodes: u32,
}

/// Derived per-profile status and counts for one show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowRollup {
    pub status: WatchStatus,
    pub seasons: Vec<SeasonRollup>,
    pub watched_episodes: u32,
    pub aired_episodes: u32,
    pub total_episodes: u32,
    /// Most recently watched episode, by event timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched: Option<EpisodeRef>,
    /// First aired, unwatched episode in season/episode order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_to_watch: Option<EpisodeRef>,
    /// Set when locally recorded episodes disagree with the catalog's
    /// declared total. Stale shows are excluded from aggregate totals rather
    /// than silently miscounted.
    pub stale: bool,
}

/// Derives the binary status of a single episode from the event set.
///
/// Unaired episodes are excluded from counts, never assigned a status, so
/// callers must check [`crate::catalog::Episode::has_aired`] first.
#[must_use]
pub fn episode_status(
    episode: &EpisodeId,
    watched_at: &HashMap<EpisodeId, DateTime<Utc>>,
) -> BinaryWatchStatus {
    if watched_at.contains_key(episode) {
        BinaryWatchStatus::Watched
    } else {
        BinaryWatchStatus::NotWatched
    }
}

/// Rolls a season's episode statuses up into a full status.
///
/// Precedence, evaluated in order: zero aired episodes ⇒ `Unaired`; zero
/// aired episodes watched ⇒ `NotWatched`; all aired watched while more are
/// scheduled ⇒ `UpToDate`; everything aired and watched ⇒ `Watched`;
/// otherwise `Watching`.
#[must_use]
pub fn rollup_season(
    season: &Season,
    watched_at: &HashMap<EpisodeId, DateTime<Utc>>,
    as_of: NaiveDate,
) -> SeasonRollup {
    let total = u32::try_from(season.episodes.len()).unwrap_or(u32::MAX);
    let aired = season.aired_episodes(as_of);
    let watched = u32::try_from(
        season
            .episodes
            .iter()
            .filter(|e| e.has_aired(as_of) && watched_at.contains_key(&e.id))
            .count(),
    )
    .unwrap_or(u32::MAX);

    let status = derive_status(watched, aired, total, total > aired);

    SeasonRollup {
        season_number: season.number,
        status,
        watched_episodes: watched,
        aired_episodes: aired,
        total_episodes: total,
    }
}

/// Rolls a show's seasons up into a full status.
///
/// Applies the same precedence ladder as [`rollup_season`] one level up, with
/// the tie-break that `UpToDate` beats `Watched` whenever the show is still
/// in production: "nothing left to watch yet" rather than "finished
/// forever". Also resolves last-watched and next-to-watch episode references
/// and flags the rollup stale when the local episode count disagrees with
/// the catalog's declared total.
#[must_use]
pub fn rollup_show(
    show: &Show,
    watched_at: &HashMap<EpisodeId, DateTime<Utc>>,
    as_of: NaiveDate,
) -> ShowRollup {
    let seasons: Vec<SeasonRollup> = show
        .seasons
        .iter()
        .map(|s| rollup_season(s, watched_at, as_of))
        .collect();

    let watched: u32 = seasons.iter().map(|s| s.watched_episodes).sum();
    let aired: u32 = seasons.iter().map(|s| s.aired_episodes).sum();
    let total: u32 = seasons.iter().map(|s| s.total_episodes).sum();

    let more_coming = show.in_production || total > aired;
    let status = derive_status(watched, aired, total, more_coming);

    let stale = show
        .number_of_episodes
        .is_some_and(|declared| declared != total);
    if stale {
        tracing::warn!(
            show = %show.id,
            declared = show.number_of_episodes,
            recorded = total,
            "episode count disagrees with catalog, marking rollup stale"
        );
    }

    let last_watched = show
        .episodes()
        .filter_map(|e| watched_at.get(&e.id).map(|t| (t, e)))
        .max_by_key(|(t, _)| **t)
        .map(|(_, e)| EpisodeRef {
            episode: e.id.clone(),
            season_number: e.season_number,
            episode_number: e.episode_number,
        });

    let next_to_watch = show
        .episodes()
        .find(|e| e.has_aired(as_of) && !watched_at.contains_key(&e.id))
        .map(|e| EpisodeRef {
            episode: e.id.clone(),
            season_number: e.season_number,
            episode_number: e.episode_number,
        });

    ShowRollup {
        status,
        seasons,
        watched_episodes: watched,
        aired_episodes: aired,
        total_episodes: total,
        last_watched,
        next_to_watch,
        stale,
    }
}

/// The shared precedence ladder behind season and show rollups.
///
/// `more_coming` means the entity is still releasing: unaired episodes are
/// scheduled or (for shows) the catalog marks it in production.
const fn derive_status(watched: u32, aired: u32, total: u32, more_coming: bool) -> WatchStatus {
    if aired == 0 {
        WatchStatus::Unaired
    } else if watched == 0 {
        WatchStatus::NotWatched
    } else if watched >= aired {
        // Everything released is watched; the tie-break depends on whether
        // more content is coming.
        if more_coming {
            WatchStatus::UpToDate
        } else if watched >= total {
            WatchStatus::Watched
        } else {
            WatchStatus::UpToDate
        }
    } else {
        WatchStatus::Watching
    }
}
