//! Import command: loads catalog content, accounts, favorites, and watch
//! events from a JSON document on stdin.

use std::io::Read;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use wl_core::catalog::{Movie, Show};
use wl_core::event::WatchEvent;
use wl_core::types::{AccountId, MovieId, ProfileId, ShowId};
use wl_db::{Database, ProfileRecord};

/// The import document shape. Every section is optional; catalog entries
/// are upserted, favorites and events are insert-or-ignore.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportDocument {
    #[serde(default)]
    pub accounts: Vec<ImportAccount>,
    #[serde(default)]
    pub profiles: Vec<ImportProfile>,
    #[serde(default)]
    pub shows: Vec<Show>,
    #[serde(default)]
    pub movies: Vec<Movie>,
    #[serde(default)]
    pub favorites: Vec<ImportFavorite>,
    #[serde(default)]
    pub events: Vec<WatchEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ImportAccount {
    pub id: AccountId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportProfile {
    pub id: ProfileId,
    pub account: AccountId,
    pub name: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
pub struct ImportFavorite {
    pub profile: ProfileId,
    #[serde(default)]
    pub show: Option<ShowId>,
    #[serde(default)]
    pub movie: Option<MovieId>,
    pub added_at: DateTime<Utc>,
}

/// Counts of applied rows, for the summary line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub shows: usize,
    pub movies: usize,
    pub favorites: usize,
    pub events: usize,
}

pub fn run<R: Read>(reader: R, db: &mut Database) -> Result<ImportStats> {
    let document = parse_document(reader)?;
    apply(db, &document)
}

fn parse_document<R: Read>(reader: R) -> Result<ImportDocument> {
    serde_json::from_reader(reader).context("invalid import JSON")
}

fn apply(db: &mut Database, document: &ImportDocument) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    for account in &document.accounts {
        db.upsert_account(&account.id, &account.name)
            .with_context(|| format!("failed to import account {}", account.id))?;
    }
    for profile in &document.profiles {
        db.upsert_profile(&ProfileRecord {
            id: profile.id.clone(),
            account: profile.account.clone(),
            name: profile.name.clone(),
            utc_offset_minutes: profile.utc_offset_minutes,
        })
        .with_context(|| format!("failed to import profile {}", profile.id))?;
    }
    for show in &document.shows {
        db.upsert_show(show)
            .with_context(|| format!("failed to import show {}", show.id))?;
        stats.shows += 1;
    }
    for movie in &document.movies {
        db.upsert_movie(movie)
            .with_context(|| format!("failed to import movie {}", movie.id))?;
        stats.movies += 1;
    }
    for favorite in &document.favorites {
        let added = match (&favorite.show, &favorite.movie) {
            (Some(show), None) => db
                .add_show_favorite(&favorite.profile, show, favorite.added_at)
                .with_context(|| format!("failed to import favorite {show}"))?,
            (None, Some(movie)) => db
                .add_movie_favorite(&favorite.profile, movie, favorite.added_at)
                .with_context(|| format!("failed to import favorite {movie}"))?,
            _ => anyhow::bail!("favorite must name exactly one of show or movie"),
        };
        if added {
            stats.favorites += 1;
        }
    }
    for event in &document.events {
        let recorded = db
            .record_watch(&event.profile, &event.target, event.watched_at)
            .with_context(|| format!("failed to import event for {}", event.profile))?;
        if recorded {
            stats.events += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = r#"{
        "accounts": [{"id": "acct-1", "name": "Family"}],
        "profiles": [{"id": "prof-1", "account": "acct-1", "name": "Sam"}],
        "shows": [{
            "id": "show-1",
            "title": "Orbit",
            "seasons": [{
                "number": 1,
                "episodes": [
                    {"id": "ep-1", "season_number": 1, "episode_number": 1,
                     "air_date": "2025-01-01", "runtime_minutes": 45},
                    {"id": "ep-2", "season_number": 1, "episode_number": 2,
                     "air_date": "2025-01-08"}
                ]
            }],
            "in_production": false,
            "number_of_episodes": 2,
            "genres": ["drama"],
            "services": ["streamer"]
        }],
        "favorites": [{"profile": "prof-1", "show": "show-1",
                       "added_at": "2025-02-01T00:00:00Z"}],
        "events": [{"profile": "prof-1",
                    "target": {"type": "episode", "id": "ep-1"},
                    "watched_at": "2025-02-02T20:00:00Z"}]
    }"#;

    #[test]
    fn import_applies_full_document() {
        let mut db = Database::open_in_memory().unwrap();
        let stats = run(Cursor::new(SAMPLE), &mut db).unwrap();

        assert_eq!(stats.shows, 1);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.events, 1);

        let counts = db.counts().unwrap();
        assert_eq!(counts.episodes, 2);
        assert_eq!(counts.watch_events, 1);
    }

    #[test]
    fn import_is_idempotent_for_events_and_favorites() {
        let mut db = Database::open_in_memory().unwrap();
        run(Cursor::new(SAMPLE), &mut db).unwrap();
        let second = run(Cursor::new(SAMPLE), &mut db).unwrap();

        assert_eq!(second.favorites, 0);
        assert_eq!(second.events, 0);
        assert_eq!(db.counts().unwrap().watch_events, 1);
    }

    #[test]
    fn import_rejects_malformed_json() {
        let mut db = Database::open_in_memory().unwrap();
        let err = run(Cursor::new("{not json"), &mut db).unwrap_err();
        assert!(err.to_string().contains("invalid import JSON"));
    }

    #[test]
    fn favorite_with_both_targets_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let doc = r#"{
            "accounts": [{"id": "a", "name": "A"}],
            "profiles": [{"id": "p", "account": "a", "name": "P"}],
            "favorites": [{"profile": "p", "show": "s", "movie": "m",
                           "added_at": "2025-01-01T00:00:00Z"}]
        }"#;
        let err = run(Cursor::new(doc), &mut db).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }
}
