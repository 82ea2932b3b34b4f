//! Watch, unwatch, and favorite commands.

use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use wl_core::event::WatchTarget;
use wl_core::types::{EpisodeId, MovieId, ProfileId, ShowId};
use wl_db::Database;

fn parse_target(episode: Option<&str>, movie: Option<&str>) -> Result<WatchTarget> {
    match (episode, movie) {
        (Some(id), None) => Ok(WatchTarget::Episode(EpisodeId::new(id)?)),
        (None, Some(id)) => Ok(WatchTarget::Movie(MovieId::new(id)?)),
        _ => bail!("specify exactly one of --episode or --movie"),
    }
}

fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("invalid --at timestamp: {raw}")),
        None => Ok(Utc::now()),
    }
}

pub fn watch<W: Write>(
    writer: &mut W,
    db: &Database,
    profile: &str,
    episode: Option<&str>,
    movie: Option<&str>,
    at: Option<&str>,
) -> Result<()> {
    let profile = ProfileId::new(profile)?;
    let target = parse_target(episode, movie)?;
    let watched_at = parse_at(at)?;

    let recorded = db
        .record_watch(&profile, &target, watched_at)
        .context("failed to record watch")?;
    if recorded {
        writeln!(writer, "Watched.")?;
    } else {
        writeln!(writer, "Already watched; keeping the original watch time.")?;
    }
    Ok(())
}

pub fn unwatch<W: Write>(
    writer: &mut W,
    db: &Database,
    profile: &str,
    episode: Option<&str>,
    movie: Option<&str>,
) -> Result<()> {
    let profile = ProfileId::new(profile)?;
    let target = parse_target(episode, movie)?;

    let removed = db
        .remove_watch(&profile, &target)
        .context("failed to remove watch")?;
    if removed {
        writeln!(writer, "Unwatched.")?;
    } else {
        writeln!(writer, "Nothing to remove.")?;
    }
    Ok(())
}

pub fn favorite<W: Write>(
    writer: &mut W,
    db: &Database,
    profile: &str,
    show: Option<&str>,
    movie: Option<&str>,
) -> Result<()> {
    let profile = ProfileId::new(profile)?;
    let added_at = Utc::now();
    let added = match (show, movie) {
        (Some(id), None) => db.add_show_favorite(&profile, &ShowId::new(id)?, added_at),
        (None, Some(id)) => db.add_movie_favorite(&profile, &MovieId::new(id)?, added_at),
        _ => bail!("specify exactly one of --show or --movie"),
    }
    .context("failed to add favorite")?;

    if added {
        writeln!(writer, "Added.")?;
    } else {
        writeln!(writer, "Already added.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wl_core::types::AccountId;
    use wl_db::ProfileRecord;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let account = AccountId::new("acct").unwrap();
        db.upsert_account(&account, "Family").unwrap();
        db.upsert_profile(&ProfileRecord {
            id: ProfileId::new("prof").unwrap(),
            account,
            name: "Sam".to_string(),
            utc_offset_minutes: 0,
        })
        .unwrap();
        db
    }

    #[test]
    fn watch_then_unwatch_round_trips() {
        let db = seeded_db();
        let mut out = Vec::new();

        watch(
            &mut out,
            &db,
            "prof",
            Some("ep-1"),
            None,
            Some("2026-01-01T20:00:00Z"),
        )
        .unwrap();
        assert_eq!(db.counts().unwrap().watch_events, 1);

        unwatch(&mut out, &db, "prof", Some("ep-1"), None).unwrap();
        assert_eq!(db.counts().unwrap().watch_events, 0);
    }

    #[test]
    fn duplicate_watch_reports_already_watched() {
        let db = seeded_db();
        let mut out = Vec::new();
        watch(&mut out, &db, "prof", None, Some("mov-1"), None).unwrap();

        let mut second = Vec::new();
        watch(&mut second, &db, "prof", None, Some("mov-1"), None).unwrap();
        let text = String::from_utf8(second).unwrap();
        assert!(text.contains("Already watched"));
    }

    #[test]
    fn target_must_be_exactly_one() {
        let db = seeded_db();
        let mut out = Vec::new();
        let err = watch(&mut out, &db, "prof", None, None, None).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let db = seeded_db();
        let mut out = Vec::new();
        let err = watch(
            &mut out,
            &db,
            "prof",
            Some("ep-1"),
            None,
            Some("yesterday"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid --at timestamp"));
    }
}
