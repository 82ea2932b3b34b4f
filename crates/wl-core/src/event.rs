//! Raw watch events, the atomic facts driving every derived statistic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EpisodeId, MovieId, ProfileId};

/// The content unit a watch event refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum WatchTarget {
    Episode(EpisodeId),
    Movie(MovieId),
}

impl WatchTarget {
    /// Returns the episode ID if this targets an episode.
    #[must_use]
    pub const fn as_episode(&self) -> Option<&EpisodeId> {
        match self {
            Self::Episode(id) => Some(id),
            Self::Movie(_) => None,
        }
    }

    /// Returns the movie ID if this targets a movie.
    #[must_use]
    pub const fn as_movie(&self) -> Option<&MovieId> {
        match self {
            Self::Movie(id) => Some(id),
            Self::Episode(_) => None,
        }
    }
}

/// The fact "profile P watched content X at time T".
///
/// Events are immutable once recorded; unmarking content removes the event
/// rather than editing it. All statuses and statistics are pure derivations
/// over the event set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchEvent {
    /// Profile that watched the content.
    pub profile: ProfileId,
    /// What was watched.
    pub target: WatchTarget,
    /// When it was marked watched.
    pub watched_at: DateTime<Utc>,
}
