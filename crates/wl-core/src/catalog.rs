//! Content catalog metadata: shows, seasons, episodes, movies.
//!
//! Catalog entries are read-only inputs supplied by the event store. The
//! engine never mutates them; air dates and production flags drive the
//! status rollup and the unaired-content counts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{EpisodeId, MovieId, ShowId};

/// A single episode within a season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Episode {
    /// Globally unique episode identifier.
    pub id: EpisodeId,
    /// Season this episode belongs to (denormalized for convenience).
    pub season_number: u32,
    /// Position within the season.
    pub episode_number: u32,
    /// Air date, if scheduled. Episodes without an air date are treated as
    /// unaired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,
    /// Runtime in minutes, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
}

impl Episode {
    /// Whether this episode has aired as of the given date.
    #[must_use]
    pub fn has_aired(&self, as_of: NaiveDate) -> bool {
        self.air_date.is_some_and(|d| d <= as_of)
    }
}

/// A season owning an ordered sequence of episodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Season {
    /// Season number within the show (specials are season 0).
    pub number: u32,
    /// Episodes in episode-number order.
    pub episodes: Vec<Episode>,
}

impl Season {
    /// Count of episodes that have aired as of the given date.
    #[must_use]
    pub fn aired_episodes(&self, as_of: NaiveDate) -> u32 {
        count_u32(self.episodes.iter().filter(|e| e.has_aired(as_of)))
    }
}

/// A show owning an ordered sequence of seasons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Show {
    pub id: ShowId,
    pub title: String,
    /// Seasons in season-number order.
    pub seasons: Vec<Season>,
    /// Whether the source is still releasing new episodes.
    pub in_production: bool,
    /// Air date of the most recently released episode, per the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_air_date: Option<NaiveDate>,
    /// Catalog-declared episode total, used to detect stale local data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_episodes: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Streaming services carrying this show.
    #[serde(default)]
    pub services: Vec<String>,
}

impl Show {
    /// Iterates over all episodes across all seasons.
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    /// Total number of episodes recorded locally.
    #[must_use]
    pub fn episode_count(&self) -> u32 {
        count_u32(self.episodes())
    }

    /// Count of episodes that have aired as of the given date.
    #[must_use]
    pub fn aired_episode_count(&self, as_of: NaiveDate) -> u32 {
        count_u32(self.episodes().filter(|e| e.has_aired(as_of)))
    }
}

/// A standalone movie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Release date, if scheduled. Movies without one are treated as
    /// unreleased.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

impl Movie {
    /// Whether this movie has been released as of the given date.
    #[must_use]
    pub fn has_released(&self, as_of: NaiveDate) -> bool {
        self.release_date.is_some_and(|d| d <= as_of)
    }
}

fn count_u32<I: Iterator>(iter: I) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}
