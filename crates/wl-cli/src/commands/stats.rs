//! Stats commands: profile- and account-scope statistics.
//!
//! Full computations (all sections) are cached in the database keyed by a
//! content hash of the snapshot, so repeated queries over an unchanged event
//! log reuse the stored payload.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use wl_core::compose::{
    account_statistics, profile_statistics, AccountStatistics, AnalyzerConfig, ProfileStatistics,
    SectionRequest,
};
use wl_core::progress::{EpisodeProgress, MovieStats, WatchStatusCounts};
use wl_core::snapshot::ProfileSnapshot;
use wl_core::timeline::TimelineConfig;
use wl_core::types::{AccountId, ProfileId};
use wl_db::{CachedStats, Database};

fn parse_sections(sections: Option<&str>) -> Result<SectionRequest> {
    match sections {
        None => Ok(SectionRequest::default()),
        Some("all") => Ok(SectionRequest::all()),
        Some(list) => SectionRequest::parse(list).context("invalid --sections"),
    }
}

fn analyzer_config(utc_offset_minutes: i32) -> AnalyzerConfig {
    AnalyzerConfig {
        timeline: TimelineConfig { utc_offset_minutes },
        ..AnalyzerConfig::default()
    }
}

pub fn run_profile<W: Write>(
    writer: &mut W,
    db: &Database,
    id: &str,
    sections: Option<&str>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let profile = ProfileId::new(id)?;
    let request = parse_sections(sections)?;
    let record = db.get_profile(&profile)?;
    let snapshot = db
        .load_profile_snapshot(&profile, now)
        .context("failed to load profile snapshot")?;
    let config = analyzer_config(record.utc_offset_minutes);

    // Only the full computation is cached; partial section requests are
    // cheap enough to recompute.
    let cache_full = request == SectionRequest::all();
    let hash = snapshot.content_hash();

    let stats = if cache_full {
        match db.cached_stats("profile", profile.as_str(), hash)? {
            Some(cached) => serde_json::from_str::<ProfileStatistics>(&cached.payload)
                .context("corrupt cached statistics")?,
            None => {
                let stats = profile_statistics(&profile, &snapshot, &request, &config);
                store_cache(db, "profile", profile.as_str(), hash, &stats, now)?;
                stats
            }
        }
    } else {
        profile_statistics(&profile, &snapshot, &request, &config)
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
    } else {
        writeln!(writer, "Profile {}", profile.as_str())?;
        write_summary(
            writer,
            &stats.progress.show_counts,
            stats.progress.episodes,
            stats.progress.movies,
        )?;
    }
    Ok(())
}

pub fn run_account<W: Write>(
    writer: &mut W,
    db: &Database,
    id: &str,
    sections: Option<&str>,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let account = AccountId::new(id)?;
    let request = parse_sections(sections)?;
    let snapshots = db
        .load_account_snapshots(&account, now)
        .context("failed to load account snapshots")?;
    // Account scope buckets by UTC; per-profile offsets apply only to their
    // own statistics.
    let config = analyzer_config(0);

    let cache_full = request == SectionRequest::all();
    let hash = account_content_hash(&snapshots);

    let stats = if cache_full {
        match db.cached_stats("account", account.as_str(), hash)? {
            Some(cached) => serde_json::from_str::<AccountStatistics>(&cached.payload)
                .context("corrupt cached statistics")?,
            None => {
                let stats = account_statistics(&account, &snapshots, &request, &config);
                store_cache(db, "account", account.as_str(), hash, &stats, now)?;
                stats
            }
        }
    } else {
        account_statistics(&account, &snapshots, &request, &config)
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
    } else {
        writeln!(
            writer,
            "Account {} ({} profiles)",
            account.as_str(),
            stats.profile_count
        )?;
        writeln!(
            writer,
            "Unique content: {} shows, {} movies",
            stats.unique_shows, stats.unique_movies
        )?;
        write_summary(writer, &stats.show_counts, stats.episodes, stats.movies)?;
    }
    Ok(())
}

/// Combined hash across the account's profile snapshots.
pub fn account_content_hash(snapshots: &[(ProfileId, ProfileSnapshot)]) -> u64 {
    snapshots
        .iter()
        .fold(0xcbf2_9ce4_8422_2325, |acc: u64, (_, snapshot)| {
            acc.wrapping_mul(0x0100_0000_01b3) ^ snapshot.content_hash()
        })
}

fn store_cache<T: serde::Serialize>(
    db: &Database,
    scope: &str,
    entity_id: &str,
    content_hash: u64,
    stats: &T,
    now: DateTime<Utc>,
) -> Result<()> {
    db.put_cached_stats(
        scope,
        entity_id,
        &CachedStats {
            content_hash,
            computed_at: now,
            payload: serde_json::to_string(stats)?,
        },
    )?;
    Ok(())
}

fn write_summary<W: Write>(
    writer: &mut W,
    counts: &WatchStatusCounts,
    episodes: EpisodeProgress,
    movies: MovieStats,
) -> Result<()> {
    writeln!(
        writer,
        "Shows: {} (watching {}, up to date {}, watched {}, not started {}, unaired {})",
        counts.total(),
        counts.watching,
        counts.up_to_date,
        counts.watched,
        counts.not_watched,
        counts.unaired,
    )?;
    writeln!(
        writer,
        "Episodes: {}/{} aired ({:.1}%)",
        episodes.watched,
        episodes.aired,
        episodes.percent.value()
    )?;
    writeln!(
        writer,
        "Movies: {}/{} ({:.1}%)",
        movies.watched,
        movies.total,
        movies.percent.value()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wl_core::catalog::{Episode, Season, Show};
    use wl_core::event::WatchTarget;
    use wl_core::types::{EpisodeId, ShowId};
    use wl_db::ProfileRecord;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn seeded_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let account = AccountId::new("acct").unwrap();
        db.upsert_account(&account, "Family").unwrap();
        db.upsert_profile(&ProfileRecord {
            id: ProfileId::new("prof").unwrap(),
            account,
            name: "Sam".to_string(),
            utc_offset_minutes: 0,
        })
        .unwrap();
        db.upsert_show(&Show {
            id: ShowId::new("show-1").unwrap(),
            title: "Orbit".to_string(),
            seasons: vec![Season {
                number: 1,
                episodes: (1..=3)
                    .map(|n| Episode {
                        id: EpisodeId::new(format!("ep-{n}")).unwrap(),
                        season_number: 1,
                        episode_number: n,
                        air_date: Some("2025-01-01".parse().unwrap()),
                        runtime_minutes: Some(45),
                    })
                    .collect(),
            }],
            in_production: false,
            last_air_date: None,
            number_of_episodes: Some(3),
            genres: vec![],
            services: vec![],
        })
        .unwrap();
        let profile = ProfileId::new("prof").unwrap();
        db.add_show_favorite(&profile, &ShowId::new("show-1").unwrap(), now())
            .unwrap();
        for n in 1..=2 {
            db.record_watch(
                &profile,
                &WatchTarget::Episode(EpisodeId::new(format!("ep-{n}")).unwrap()),
                now(),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn profile_summary_shows_progress() {
        let db = seeded_db();
        let mut out = Vec::new();
        run_profile(&mut out, &db, "prof", None, false, now()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Episodes: 2/3 aired"));
        assert!(text.contains("watching 1"));
    }

    #[test]
    fn profile_json_round_trips() {
        let db = seeded_db();
        let mut out = Vec::new();
        run_profile(&mut out, &db, "prof", Some("all"), true, now()).unwrap();
        let stats: ProfileStatistics = serde_json::from_slice(&out).unwrap();
        assert_eq!(stats.progress.episodes.watched, 2);
        assert!(stats.streaks.as_present().is_some());
    }

    #[test]
    fn full_request_populates_and_reuses_cache() {
        let db = seeded_db();
        let profile = ProfileId::new("prof").unwrap();
        let mut out = Vec::new();
        run_profile(&mut out, &db, "prof", Some("all"), true, now()).unwrap();

        let snapshot = db.load_profile_snapshot(&profile, now()).unwrap();
        let cached = db
            .cached_stats("profile", "prof", snapshot.content_hash())
            .unwrap();
        assert!(cached.is_some());

        // A new watch changes the hash; the stale cache entry must miss.
        db.record_watch(
            &profile,
            &WatchTarget::Episode(EpisodeId::new("ep-3").unwrap()),
            now(),
        )
        .unwrap();
        let snapshot = db.load_profile_snapshot(&profile, now()).unwrap();
        let stale = db
            .cached_stats("profile", "prof", snapshot.content_hash())
            .unwrap();
        assert!(stale.is_none());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let db = seeded_db();
        let mut out = Vec::new();
        let err = run_profile(&mut out, &db, "prof", Some("bogus"), false, now()).unwrap_err();
        assert!(err.to_string().contains("invalid --sections"));
    }

    #[test]
    fn account_stats_aggregate_across_profiles() {
        let db = seeded_db();
        let mut out = Vec::new();
        run_account(&mut out, &db, "acct", None, false, now()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Account acct (1 profiles)"));
        assert!(text.contains("Unique content: 1 shows, 0 movies"));
    }

    #[test]
    fn missing_profile_fails_with_not_found() {
        let db = seeded_db();
        let mut out = Vec::new();
        let err = run_profile(&mut out, &db, "nobody", None, false, now()).unwrap_err();
        assert!(err.to_string().contains("profile not found"));
    }
}
