//! Immutable input snapshots.
//!
//! Every analyzer consumes a [`ProfileSnapshot`]: the favorited catalog
//! entries, when they were added, and the profile's watch events, frozen at
//! a single `as_of` instant. Snapshots are fetched once per request and
//! never mutated, so each computation is a pure function and independent
//! computations can run in parallel.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Movie, Show};
use crate::event::{WatchEvent, WatchTarget};
use crate::types::{EpisodeId, MovieId, ShowId};

/// Frozen inputs for one profile's statistics computation.
///
/// Account scope uses the same type: [`ProfileSnapshot::union`] merges
/// per-profile snapshots, de-duplicating content and re-sorting the combined
/// event log, because velocity/streak/binge metrics must be recomputed over
/// the union rather than merged from per-profile outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Favorited shows with full catalog detail.
    pub shows: Vec<Show>,
    /// Favorited movies.
    pub movies: Vec<Movie>,
    /// When each show was added to the profile.
    pub show_added: BTreeMap<ShowId, DateTime<Utc>>,
    /// When each movie was added to the profile.
    pub movie_added: BTreeMap<MovieId, DateTime<Utc>>,
    /// Watch events sorted by `watched_at` ascending.
    pub events: Vec<WatchEvent>,
    /// The instant the snapshot was taken; all air-date comparisons and
    /// trailing windows are anchored here so recomputation is deterministic.
    pub as_of: DateTime<Utc>,
}

impl ProfileSnapshot {
    /// The snapshot date, for air-date comparisons.
    #[must_use]
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.date_naive()
    }

    /// First watch timestamp per episode.
    #[must_use]
    pub fn episode_watch_times(&self) -> HashMap<EpisodeId, DateTime<Utc>> {
        let mut times = HashMap::new();
        for event in &self.events {
            if let WatchTarget::Episode(id) = &event.target {
                times.entry(id.clone()).or_insert(event.watched_at);
            }
        }
        times
    }

    /// First watch timestamp per movie.
    #[must_use]
    pub fn movie_watch_times(&self) -> HashMap<MovieId, DateTime<Utc>> {
        let mut times = HashMap::new();
        for event in &self.events {
            if let WatchTarget::Movie(id) = &event.target {
                times.entry(id.clone()).or_insert(event.watched_at);
            }
        }
        times
    }

    /// Maps each episode to its owning show.
    #[must_use]
    pub fn episode_show_index(&self) -> HashMap<&EpisodeId, &ShowId> {
        self.shows
            .iter()
            .flat_map(|show| show.episodes().map(move |e| (&e.id, &show.id)))
            .collect()
    }

    /// Maps each episode and movie to its runtime in minutes, where known.
    #[must_use]
    pub fn runtime_index(&self) -> HashMap<WatchTarget, u32> {
        let mut runtimes = HashMap::new();
        for show in &self.shows {
            for episode in show.episodes() {
                if let Some(minutes) = episode.runtime_minutes {
                    runtimes.insert(WatchTarget::Episode(episode.id.clone()), minutes);
                }
            }
        }
        for movie in &self.movies {
            if let Some(minutes) = movie.runtime_minutes {
                runtimes.insert(WatchTarget::Movie(movie.id.clone()), minutes);
            }
        }
        runtimes
    }

    /// Merges per-profile snapshots into an account-scope snapshot.
    ///
    /// Shows and movies favorited by multiple profiles appear once; the
    /// earliest `added_at` wins. Events are concatenated and re-sorted so
    /// the non-linear analyzers (velocity, streaks, binges) operate on the
    /// true union of underlying facts.
    #[must_use]
    pub fn union(parts: &[Self], as_of: DateTime<Utc>) -> Self {
        let mut shows: BTreeMap<ShowId, Show> = BTreeMap::new();
        let mut movies: BTreeMap<MovieId, Movie> = BTreeMap::new();
        let mut show_added: BTreeMap<ShowId, DateTime<Utc>> = BTreeMap::new();
        let mut movie_added: BTreeMap<MovieId, DateTime<Utc>> = BTreeMap::new();
        let mut events: Vec<WatchEvent> = Vec::new();

        for part in parts {
            for show in &part.shows {
                shows.entry(show.id.clone()).or_insert_with(|| show.clone());
            }
            for movie in &part.movies {
                movies
                    .entry(movie.id.clone())
                    .or_insert_with(|| movie.clone());
            }
            for (id, added) in &part.show_added {
                show_added
                    .entry(id.clone())
                    .and_modify(|existing| *existing = (*existing).min(*added))
                    .or_insert(*added);
            }
            for (id, added) in &part.movie_added {
                movie_added
                    .entry(id.clone())
                    .and_modify(|existing| *existing = (*existing).min(*added))
                    .or_insert(*added);
            }
            events.extend(part.events.iter().cloned());
        }

        events.sort_by(|a, b| {
            a.watched_at
                .cmp(&b.watched_at)
                .then_with(|| a.target.cmp(&b.target))
        });

        Self {
            shows: shows.into_values().collect(),
            movies: movies.into_values().collect(),
            show_added,
            movie_added,
            events,
            as_of,
        }
    }

    /// Stable 64-bit FNV-1a hash over the (target, timestamp) pairs.
    ///
    /// Used as the statistics-cache key: any added or removed event changes
    /// the hash, and the sort pass makes it insensitive to storage order.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut keys: Vec<String> = self
            .events
            .iter()
            .map(|e| {
                let target = match &e.target {
                    WatchTarget::Episode(id) => format!("e:{id}"),
                    WatchTarget::Movie(id) => format!("m:{id}"),
                };
                format!("{target}@{}", e.watched_at.timestamp())
            })
            .collect();
        keys.sort_unstable();

        let mut hash = FNV_OFFSET;
        for key in &keys {
            for byte in key.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            hash ^= u64::from(b'\n');
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}
