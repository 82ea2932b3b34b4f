//! Storage layer for the watch tracker.
//!
//! Persists the content catalog, accounts/profiles, favorites, and the
//! append-only watch-event log using `rusqlite`, and assembles the immutable
//! [`ProfileSnapshot`] values the analytics engine consumes.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. For multi-threaded access use a `Mutex<Database>` or one instance
//! per thread.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in ISO 8601 format (e.g.
//! `2024-01-15T10:30:00Z`), so lexicographic ordering matches chronological
//! ordering. Dates (air dates, release dates) are `YYYY-MM-DD` TEXT.
//!
//! Watch events carry a UNIQUE constraint on (profile, target): marking the
//! same episode watched twice is a no-op, and unmarking deletes the row.
//! Season and show statuses are never stored; they are recomputed from the
//! event log. The `stats_cache` table holds serialized statistics keyed by a
//! content hash of the inputs, invalidated implicitly when the hash changes.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use wl_core::catalog::{Episode, Movie, Season, Show};
use wl_core::event::{WatchEvent, WatchTarget};
use wl_core::snapshot::ProfileSnapshot;
use wl_core::types::{AccountId, EpisodeId, MovieId, ProfileId, ShowId, ValidationError};

/// Database errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored ID failed validation on the way out.
    #[error("invalid stored id: {0}")]
    InvalidId(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {entity}: {timestamp}")]
    TimestampParse {
        entity: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored date.
    #[error("invalid date for {entity}: {date}")]
    DateParse {
        entity: String,
        date: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored JSON column.
    #[error("invalid data for {entity}: {message}")]
    InvalidData { entity: String, message: String },
    /// The requested profile does not exist.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),
    /// The requested account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(String),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A profile row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub account: AccountId,
    pub name: String,
    /// Offset from UTC, in minutes, for calendar-day bucketing.
    pub utc_offset_minutes: i32,
}

/// Row counts for the database overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseCounts {
    pub accounts: u64,
    pub profiles: u64,
    pub shows: u64,
    pub episodes: u64,
    pub movies: u64,
    pub favorites: u64,
    pub watch_events: u64,
}

/// A cached statistics payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStats {
    pub content_hash: u64,
    pub computed_at: DateTime<Utc>,
    /// Serialized statistics JSON.
    pub payload: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema. Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                name TEXT NOT NULL,
                utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_account ON profiles(account_id);

            -- Catalog tables. genres/services are JSON string arrays.
            CREATE TABLE IF NOT EXISTS shows (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                in_production INTEGER NOT NULL DEFAULT 0,
                last_air_date TEXT,
                number_of_episodes INTEGER,
                genres TEXT NOT NULL DEFAULT '[]',
                services TEXT NOT NULL DEFAULT '[]'
            );

            -- air_date: 'YYYY-MM-DD'; NULL means unscheduled (treated unaired)
            CREATE TABLE IF NOT EXISTS episodes (
                id TEXT PRIMARY KEY,
                show_id TEXT NOT NULL,
                season_number INTEGER NOT NULL,
                episode_number INTEGER NOT NULL,
                air_date TEXT,
                runtime_minutes INTEGER,
                FOREIGN KEY (show_id) REFERENCES shows(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_episodes_show ON episodes(show_id);

            CREATE TABLE IF NOT EXISTS movies (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                release_date TEXT,
                runtime_minutes INTEGER,
                genres TEXT NOT NULL DEFAULT '[]',
                services TEXT NOT NULL DEFAULT '[]'
            );

            -- content_type is 'show' or 'movie'; added_at drives backlog aging
            CREATE TABLE IF NOT EXISTS favorites (
                profile_id TEXT NOT NULL,
                content_type TEXT NOT NULL,
                content_id TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (profile_id, content_type, content_id),
                FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
            );

            -- Append-only watch log. target_type is 'episode' or 'movie'.
            -- The UNIQUE key makes marking idempotent; unmarking deletes.
            CREATE TABLE IF NOT EXISTS watch_events (
                profile_id TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                watched_at TEXT NOT NULL,
                PRIMARY KEY (profile_id, target_type, target_id),
                FOREIGN KEY (profile_id) REFERENCES profiles(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_watch_events_watched ON watch_events(watched_at);

            -- Derived statistics, keyed by a content hash of the inputs.
            -- scope is 'profile' or 'account'.
            CREATE TABLE IF NOT EXISTS stats_cache (
                scope TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                computed_at TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (scope, entity_id)
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts or updates an account.
    pub fn upsert_account(&self, id: &AccountId, name: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO accounts (id, name) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
            params![id.as_str(), name],
        )?;
        Ok(())
    }

    /// Inserts or updates a profile.
    pub fn upsert_profile(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        self.require_account(&record.account)?;
        self.conn.execute(
            "
            INSERT INTO profiles (id, account_id, name, utc_offset_minutes)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                account_id = excluded.account_id,
                name = excluded.name,
                utc_offset_minutes = excluded.utc_offset_minutes
            ",
            params![
                record.id.as_str(),
                record.account.as_str(),
                record.name,
                record.utc_offset_minutes,
            ],
        )?;
        Ok(())
    }

    /// Inserts or updates a show and all of its episodes.
    pub fn upsert_show(&mut self, show: &Show) -> Result<(), StoreError> {
        let genres = to_json(&show.genres, show.id.as_str())?;
        let services = to_json(&show.services, show.id.as_str())?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO shows (id, title, in_production, last_air_date, number_of_episodes, genres, services)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                in_production = excluded.in_production,
                last_air_date = excluded.last_air_date,
                number_of_episodes = excluded.number_of_episodes,
                genres = excluded.genres,
                services = excluded.services
            ",
            params![
                show.id.as_str(),
                show.title,
                i64::from(show.in_production),
                show.last_air_date.map(|d| d.to_string()),
                show.number_of_episodes,
                genres,
                services,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO episodes (id, show_id, season_number, episode_number, air_date, runtime_minutes)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    show_id = excluded.show_id,
                    season_number = excluded.season_number,
                    episode_number = excluded.episode_number,
                    air_date = excluded.air_date,
                    runtime_minutes = excluded.runtime_minutes
                ",
            )?;
            for season in &show.seasons {
                for episode in &season.episodes {
                    stmt.execute(params![
                        episode.id.as_str(),
                        show.id.as_str(),
                        episode.season_number,
                        episode.episode_number,
                        episode.air_date.map(|d| d.to_string()),
                        episode.runtime_minutes,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Inserts or updates a movie.
    pub fn upsert_movie(&self, movie: &Movie) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO movies (id, title, release_date, runtime_minutes, genres, services)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                release_date = excluded.release_date,
                runtime_minutes = excluded.runtime_minutes,
                genres = excluded.genres,
                services = excluded.services
            ",
            params![
                movie.id.as_str(),
                movie.title,
                movie.release_date.map(|d| d.to_string()),
                movie.runtime_minutes,
                to_json(&movie.genres, movie.id.as_str())?,
                to_json(&movie.services, movie.id.as_str())?,
            ],
        )?;
        Ok(())
    }

    /// Adds a show to a profile, recording when it was added. Re-adding
    /// keeps the original `added_at`.
    pub fn add_show_favorite(
        &self,
        profile: &ProfileId,
        show: &ShowId,
        added_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.require_profile(profile)?;
        self.add_favorite(profile, "show", show.as_str(), added_at)
    }

    /// Adds a movie to a profile.
    pub fn add_movie_favorite(
        &self,
        profile: &ProfileId,
        movie: &MovieId,
        added_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.require_profile(profile)?;
        self.add_favorite(profile, "movie", movie.as_str(), added_at)
    }

    fn add_favorite(
        &self,
        profile: &ProfileId,
        content_type: &str,
        content_id: &str,
        added_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO favorites (profile_id, content_type, content_id, added_at)
            VALUES (?, ?, ?, ?)
            ",
            params![
                profile.as_str(),
                content_type,
                content_id,
                format_timestamp(added_at)
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Records a watch event. Returns `false` when the target was already
    /// watched by this profile (the existing event is left untouched).
    pub fn record_watch(
        &self,
        profile: &ProfileId,
        target: &WatchTarget,
        watched_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.require_profile(profile)?;
        let (target_type, target_id) = target_parts(target);
        let inserted = self.conn.execute(
            "
            INSERT OR IGNORE INTO watch_events (profile_id, target_type, target_id, watched_at)
            VALUES (?, ?, ?, ?)
            ",
            params![
                profile.as_str(),
                target_type,
                target_id,
                format_timestamp(watched_at)
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Removes a watch event. Returns `false` when nothing was recorded.
    pub fn remove_watch(
        &self,
        profile: &ProfileId,
        target: &WatchTarget,
    ) -> Result<bool, StoreError> {
        self.require_profile(profile)?;
        let (target_type, target_id) = target_parts(target);
        let deleted = self.conn.execute(
            "
            DELETE FROM watch_events
            WHERE profile_id = ? AND target_type = ? AND target_id = ?
            ",
            params![profile.as_str(), target_type, target_id],
        )?;
        Ok(deleted > 0)
    }

    /// Lists all accounts ordered by ID.
    pub fn list_accounts(&self) -> Result<Vec<(AccountId, String)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM accounts ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut accounts = Vec::new();
        for row in rows {
            let (id, name) = row?;
            accounts.push((AccountId::new(id)?, name));
        }
        Ok(accounts)
    }

    /// Lists the profiles of one account, ordered by ID.
    pub fn list_profiles(&self, account: &AccountId) -> Result<Vec<ProfileRecord>, StoreError> {
        self.require_account(account)?;
        let mut stmt = self.conn.prepare(
            "
            SELECT id, account_id, name, utc_offset_minutes
            FROM profiles
            WHERE account_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([account.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
            ))
        })?;
        let mut profiles = Vec::new();
        for row in rows {
            let (id, account_id, name, utc_offset_minutes) = row?;
            profiles.push(ProfileRecord {
                id: ProfileId::new(id)?,
                account: AccountId::new(account_id)?,
                name,
                utc_offset_minutes,
            });
        }
        Ok(profiles)
    }

    /// Loads one profile row.
    pub fn get_profile(&self, profile: &ProfileId) -> Result<ProfileRecord, StoreError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, account_id, name, utc_offset_minutes
                FROM profiles WHERE id = ?
                ",
                [profile.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                    ))
                },
            )
            .optional()?;
        let (id, account_id, name, utc_offset_minutes) =
            row.ok_or_else(|| StoreError::ProfileNotFound(profile.as_str().to_string()))?;
        Ok(ProfileRecord {
            id: ProfileId::new(id)?,
            account: AccountId::new(account_id)?,
            name,
            utc_offset_minutes,
        })
    }

    /// Assembles the immutable snapshot for one profile: its favorited
    /// shows (with full catalog detail), movies, added-at times, and the
    /// profile's watch events sorted by time.
    pub fn load_profile_snapshot(
        &self,
        profile: &ProfileId,
        as_of: DateTime<Utc>,
    ) -> Result<ProfileSnapshot, StoreError> {
        self.require_profile(profile)?;

        let mut show_added: BTreeMap<ShowId, DateTime<Utc>> = BTreeMap::new();
        let mut movie_added: BTreeMap<MovieId, DateTime<Utc>> = BTreeMap::new();
        {
            let mut stmt = self.conn.prepare(
                "
                SELECT content_type, content_id, added_at
                FROM favorites
                WHERE profile_id = ?
                ORDER BY content_id ASC
                ",
            )?;
            let rows = stmt.query_map([profile.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            for row in rows {
                let (content_type, content_id, added_at) = row?;
                let added_at = parse_timestamp(&added_at, &content_id)?;
                match content_type.as_str() {
                    "show" => {
                        show_added.insert(ShowId::new(content_id)?, added_at);
                    }
                    "movie" => {
                        movie_added.insert(MovieId::new(content_id)?, added_at);
                    }
                    other => {
                        return Err(StoreError::InvalidData {
                            entity: content_id,
                            message: format!("unknown favorite content type {other}"),
                        });
                    }
                }
            }
        }

        let mut shows = Vec::with_capacity(show_added.len());
        for id in show_added.keys() {
            shows.push(self.load_show(id)?);
        }
        let mut movies = Vec::with_capacity(movie_added.len());
        for id in movie_added.keys() {
            movies.push(self.load_movie(id)?);
        }
        let events = self.load_events(profile)?;
        tracing::debug!(
            profile = profile.as_str(),
            shows = shows.len(),
            movies = movies.len(),
            events = events.len(),
            "loaded profile snapshot"
        );

        Ok(ProfileSnapshot {
            shows,
            movies,
            show_added,
            movie_added,
            events,
            as_of,
        })
    }

    /// Loads snapshots for every profile of one account, in profile-id order.
    pub fn load_account_snapshots(
        &self,
        account: &AccountId,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<(ProfileId, ProfileSnapshot)>, StoreError> {
        let profiles = self.list_profiles(account)?;
        let mut snapshots = Vec::with_capacity(profiles.len());
        for record in profiles {
            let snapshot = self.load_profile_snapshot(&record.id, as_of)?;
            snapshots.push((record.id, snapshot));
        }
        Ok(snapshots)
    }

    /// Loads one show with its seasons and episodes.
    pub fn load_show(&self, id: &ShowId) -> Result<Show, StoreError> {
        let (title, in_production, last_air_date, number_of_episodes, genres, services) =
            self.conn.query_row(
                "
                SELECT title, in_production, last_air_date, number_of_episodes, genres, services
                FROM shows WHERE id = ?
                ",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<u32>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )?;

        let mut stmt = self.conn.prepare(
            "
            SELECT id, season_number, episode_number, air_date, runtime_minutes
            FROM episodes
            WHERE show_id = ?
            ORDER BY season_number ASC, episode_number ASC
            ",
        )?;
        let rows = stmt.query_map([id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<u32>>(4)?,
            ))
        })?;

        let mut seasons: Vec<Season> = Vec::new();
        for row in rows {
            let (episode_id, season_number, episode_number, air_date, runtime_minutes) = row?;
            let air_date = air_date
                .map(|d| parse_date(&d, &episode_id))
                .transpose()?;
            let episode = Episode {
                id: EpisodeId::new(episode_id)?,
                season_number,
                episode_number,
                air_date,
                runtime_minutes,
            };
            match seasons.last_mut() {
                Some(season) if season.number == season_number => {
                    season.episodes.push(episode);
                }
                _ => seasons.push(Season {
                    number: season_number,
                    episodes: vec![episode],
                }),
            }
        }

        Ok(Show {
            id: id.clone(),
            title,
            seasons,
            in_production: in_production != 0,
            last_air_date: last_air_date
                .map(|d| parse_date(&d, id.as_str()))
                .transpose()?,
            number_of_episodes,
            genres: from_json(&genres, id.as_str())?,
            services: from_json(&services, id.as_str())?,
        })
    }

    /// Loads one movie.
    pub fn load_movie(&self, id: &MovieId) -> Result<Movie, StoreError> {
        let (title, release_date, runtime_minutes, genres, services) = self.conn.query_row(
            "
            SELECT title, release_date, runtime_minutes, genres, services
            FROM movies WHERE id = ?
            ",
            [id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<u32>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        Ok(Movie {
            id: id.clone(),
            title,
            release_date: release_date
                .map(|d| parse_date(&d, id.as_str()))
                .transpose()?,
            runtime_minutes,
            genres: from_json(&genres, id.as_str())?,
            services: from_json(&services, id.as_str())?,
        })
    }

    fn load_events(&self, profile: &ProfileId) -> Result<Vec<WatchEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT target_type, target_id, watched_at
            FROM watch_events
            WHERE profile_id = ?
            ORDER BY watched_at ASC, target_id ASC
            ",
        )?;
        let rows = stmt.query_map([profile.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (target_type, target_id, watched_at) = row?;
            let watched_at = parse_timestamp(&watched_at, &target_id)?;
            let target = match target_type.as_str() {
                "episode" => WatchTarget::Episode(EpisodeId::new(target_id)?),
                "movie" => WatchTarget::Movie(MovieId::new(target_id)?),
                other => {
                    return Err(StoreError::InvalidData {
                        entity: target_id,
                        message: format!("unknown watch target type {other}"),
                    });
                }
            };
            events.push(WatchEvent {
                profile: profile.clone(),
                target,
                watched_at,
            });
        }
        Ok(events)
    }

    /// Fetches the cached statistics for an entity, returning `None` when
    /// nothing is cached or the stored content hash no longer matches.
    pub fn cached_stats(
        &self,
        scope: &str,
        entity_id: &str,
        content_hash: u64,
    ) -> Result<Option<CachedStats>, StoreError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT content_hash, computed_at, payload
                FROM stats_cache
                WHERE scope = ? AND entity_id = ?
                ",
                params![scope, entity_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((stored_hash, computed_at, payload)) = row else {
            return Ok(None);
        };
        if stored_hash != content_hash.to_string() {
            return Ok(None);
        }
        let computed_at = parse_timestamp(&computed_at, entity_id)?;
        Ok(Some(CachedStats {
            content_hash,
            computed_at,
            payload,
        }))
    }

    /// Stores the statistics payload for an entity, replacing any previous
    /// cache row.
    pub fn put_cached_stats(
        &self,
        scope: &str,
        entity_id: &str,
        stats: &CachedStats,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "
            INSERT INTO stats_cache (scope, entity_id, content_hash, computed_at, payload)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(scope, entity_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                computed_at = excluded.computed_at,
                payload = excluded.payload
            ",
            params![
                scope,
                entity_id,
                stats.content_hash.to_string(),
                format_timestamp(stats.computed_at),
                stats.payload,
            ],
        )?;
        Ok(())
    }

    /// Row counts across all tables, for the status overview.
    pub fn counts(&self) -> Result<DatabaseCounts, StoreError> {
        Ok(DatabaseCounts {
            accounts: self.count("accounts")?,
            profiles: self.count("profiles")?,
            shows: self.count("shows")?,
            episodes: self.count("episodes")?,
            movies: self.count("movies")?,
            favorites: self.count("favorites")?,
            watch_events: self.count("watch_events")?,
        })
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        // table names come from the fixed list in counts()
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn require_account(&self, account: &AccountId) -> Result<(), StoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM accounts WHERE id = ?",
                [account.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::AccountNotFound(account.as_str().to_string()));
        }
        Ok(())
    }

    fn require_profile(&self, profile: &ProfileId) -> Result<(), StoreError> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM profiles WHERE id = ?",
                [profile.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::ProfileNotFound(profile.as_str().to_string()));
        }
        Ok(())
    }
}

fn target_parts(target: &WatchTarget) -> (&'static str, &str) {
    match target {
        WatchTarget::Episode(id) => ("episode", id.as_str()),
        WatchTarget::Movie(id) => ("movie", id.as_str()),
    }
}

fn parse_timestamp(timestamp: &str, entity: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| StoreError::TimestampParse {
            entity: entity.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_date(date: &str, entity: &str) -> Result<NaiveDate, StoreError> {
    date.parse().map_err(|source| StoreError::DateParse {
        entity: entity.to_string(),
        date: date.to_string(),
        source,
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_json(values: &[String], entity: &str) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|err| StoreError::InvalidData {
        entity: entity.to_string(),
        message: err.to_string(),
    })
}

fn from_json(json: &str, entity: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(json).map_err(|err| StoreError::InvalidData {
        entity: entity.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
    }

    fn seed_profile(db: &Database) -> ProfileId {
        let account = AccountId::new("acct-1").unwrap();
        db.upsert_account(&account, "Family").unwrap();
        let profile = ProfileId::new("prof-1").unwrap();
        db.upsert_profile(&ProfileRecord {
            id: profile.clone(),
            account,
            name: "Sam".to_string(),
            utc_offset_minutes: 0,
        })
        .unwrap();
        profile
    }

    fn sample_show() -> Show {
        Show {
            id: ShowId::new("show-1").unwrap(),
            title: "Orbit".to_string(),
            seasons: vec![Season {
                number: 1,
                episodes: vec![
                    Episode {
                        id: EpisodeId::new("ep-1").unwrap(),
                        season_number: 1,
                        episode_number: 1,
                        air_date: Some("2025-01-01".parse().unwrap()),
                        runtime_minutes: Some(45),
                    },
                    Episode {
                        id: EpisodeId::new("ep-2").unwrap(),
                        season_number: 1,
                        episode_number: 2,
                        air_date: Some("2025-01-08".parse().unwrap()),
                        runtime_minutes: None,
                    },
                ],
            }],
            in_production: true,
            last_air_date: Some("2025-01-08".parse().unwrap()),
            number_of_episodes: Some(2),
            genres: vec!["drama".to_string()],
            services: vec!["streamer".to_string()],
        }
    }

    #[test]
    fn open_in_memory_database() {
        assert!(Database::open_in_memory().is_ok());
    }

    #[test]
    fn open_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlog.db");
        let db = Database::open(&path).unwrap();
        drop(db);
        assert!(path.exists());
    }

    #[test]
    fn show_round_trips_through_storage() {
        let mut db = Database::open_in_memory().unwrap();
        let show = sample_show();
        db.upsert_show(&show).unwrap();

        let loaded = db.load_show(&show.id).unwrap();
        assert_eq!(loaded, show);
    }

    #[test]
    fn upsert_show_replaces_metadata() {
        let mut db = Database::open_in_memory().unwrap();
        let mut show = sample_show();
        db.upsert_show(&show).unwrap();

        show.in_production = false;
        show.title = "Orbit (Final)".to_string();
        db.upsert_show(&show).unwrap();

        let loaded = db.load_show(&show.id).unwrap();
        assert!(!loaded.in_production);
        assert_eq!(loaded.title, "Orbit (Final)");
    }

    #[test]
    fn record_watch_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        let profile = seed_profile(&db);
        db.upsert_show(&sample_show()).unwrap();

        let target = WatchTarget::Episode(EpisodeId::new("ep-1").unwrap());
        assert!(db.record_watch(&profile, &target, ts(10)).unwrap());
        assert!(!db.record_watch(&profile, &target, ts(11)).unwrap());

        let snapshot = db.load_profile_snapshot(&profile, ts(12)).unwrap();
        assert_eq!(snapshot.events.len(), 1);
        // The first event wins.
        assert_eq!(snapshot.events[0].watched_at, ts(10));
    }

    #[test]
    fn remove_watch_deletes_the_event() {
        let db = Database::open_in_memory().unwrap();
        let profile = seed_profile(&db);

        let target = WatchTarget::Episode(EpisodeId::new("ep-1").unwrap());
        assert!(!db.remove_watch(&profile, &target).unwrap());
        db.record_watch(&profile, &target, ts(10)).unwrap();
        assert!(db.remove_watch(&profile, &target).unwrap());

        let snapshot = db.load_profile_snapshot(&profile, ts(12)).unwrap();
        assert!(snapshot.events.is_empty());
    }

    #[test]
    fn snapshot_includes_favorites_and_added_times() {
        let mut db = Database::open_in_memory().unwrap();
        let profile = seed_profile(&db);
        let show = sample_show();
        db.upsert_show(&show).unwrap();
        db.upsert_movie(&Movie {
            id: MovieId::new("mov-1").unwrap(),
            title: "Launch".to_string(),
            release_date: Some("2024-06-01".parse().unwrap()),
            runtime_minutes: Some(120),
            genres: vec![],
            services: vec![],
        })
        .unwrap();

        assert!(db.add_show_favorite(&profile, &show.id, ts(1)).unwrap());
        // Re-adding keeps the original added_at.
        assert!(!db.add_show_favorite(&profile, &show.id, ts(5)).unwrap());
        db.add_movie_favorite(&profile, &MovieId::new("mov-1").unwrap(), ts(2))
            .unwrap();

        let snapshot = db.load_profile_snapshot(&profile, ts(12)).unwrap();
        assert_eq!(snapshot.shows.len(), 1);
        assert_eq!(snapshot.movies.len(), 1);
        assert_eq!(snapshot.show_added.get(&show.id), Some(&ts(1)));
        assert_eq!(snapshot.as_of, ts(12));
    }

    #[test]
    fn missing_profile_surfaces_not_found() {
        let db = Database::open_in_memory().unwrap();
        let profile = ProfileId::new("missing").unwrap();
        let err = db.load_profile_snapshot(&profile, ts(0)).unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(id) if id == "missing"));
    }

    #[test]
    fn missing_account_surfaces_not_found() {
        let db = Database::open_in_memory().unwrap();
        let account = AccountId::new("missing").unwrap();
        let err = db.list_profiles(&account).unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(id) if id == "missing"));
    }

    #[test]
    fn account_snapshots_cover_every_profile() {
        let db = Database::open_in_memory().unwrap();
        let account = AccountId::new("acct-1").unwrap();
        db.upsert_account(&account, "Family").unwrap();
        for name in ["prof-a", "prof-b"] {
            db.upsert_profile(&ProfileRecord {
                id: ProfileId::new(name).unwrap(),
                account: account.clone(),
                name: name.to_string(),
                utc_offset_minutes: 0,
            })
            .unwrap();
        }

        let snapshots = db.load_account_snapshots(&account, ts(0)).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].0.as_str(), "prof-a");
    }

    #[test]
    fn stats_cache_misses_on_hash_change() {
        let db = Database::open_in_memory().unwrap();
        let stats = CachedStats {
            content_hash: 42,
            computed_at: ts(3),
            payload: r#"{"ok":true}"#.to_string(),
        };
        db.put_cached_stats("profile", "prof-1", &stats).unwrap();

        let hit = db.cached_stats("profile", "prof-1", 42).unwrap();
        assert_eq!(hit, Some(stats));
        let miss = db.cached_stats("profile", "prof-1", 43).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn counts_reflect_inserted_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let profile = seed_profile(&db);
        db.upsert_show(&sample_show()).unwrap();
        db.record_watch(
            &profile,
            &WatchTarget::Episode(EpisodeId::new("ep-1").unwrap()),
            ts(10),
        )
        .unwrap();

        let counts = db.counts().unwrap();
        assert_eq!(counts.accounts, 1);
        assert_eq!(counts.profiles, 1);
        assert_eq!(counts.shows, 1);
        assert_eq!(counts.episodes, 2);
        assert_eq!(counts.watch_events, 1);
    }
}
