//! Admin commands: platform-wide statistics across all accounts.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use wl_core::admin::{account_rankings, content_report, platform_overview, AccountProfiles};
use wl_db::Database;

fn load_all_accounts(db: &Database, now: DateTime<Utc>) -> Result<Vec<AccountProfiles>> {
    let mut accounts = Vec::new();
    for (account, _name) in db.list_accounts()? {
        let profiles = db
            .load_account_snapshots(&account, now)
            .with_context(|| format!("failed to load account {account}"))?;
        accounts.push(AccountProfiles { account, profiles });
    }
    Ok(accounts)
}

pub fn overview<W: Write>(writer: &mut W, db: &Database, json: bool, now: DateTime<Utc>) -> Result<()> {
    let accounts = load_all_accounts(db, now)?;
    let overview = platform_overview(&accounts);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&overview)?)?;
        return Ok(());
    }
    writeln!(writer, "Platform overview")?;
    writeln!(
        writer,
        "Accounts: {} ({} active in the last 30 days)",
        overview.account_count, overview.active_accounts
    )?;
    writeln!(writer, "Profiles: {}", overview.profile_count)?;
    writeln!(
        writer,
        "Watch events: {} ({} in the last 30 days)",
        overview.total_watch_events, overview.events_last_30_days
    )?;
    writeln!(
        writer,
        "Content: {} shows, {} movies",
        overview.distinct_shows, overview.distinct_movies
    )?;
    Ok(())
}

pub fn rankings<W: Write>(writer: &mut W, db: &Database, json: bool, now: DateTime<Utc>) -> Result<()> {
    let accounts = load_all_accounts(db, now)?;
    let rankings = account_rankings(&accounts);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&rankings)?)?;
        return Ok(());
    }
    writeln!(writer, "Account rankings (by 30-day activity)")?;
    for (position, health) in rankings.iter().enumerate() {
        writeln!(
            writer,
            "{}. {}: {} events (30d), {} total, {} at-risk shows, {:.1}% abandonment",
            position + 1,
            health.account,
            health.events_last_30_days,
            health.total_events,
            health.at_risk_shows,
            health.abandonment_rate.value(),
        )?;
    }
    Ok(())
}

pub fn content<W: Write>(writer: &mut W, db: &Database, json: bool, now: DateTime<Utc>) -> Result<()> {
    let accounts = load_all_accounts(db, now)?;
    let report = content_report(&accounts);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }
    writeln!(writer, "Most watched shows")?;
    for show in report.shows.iter().take(10) {
        writeln!(
            writer,
            "- {} ({} profiles, {} events)",
            show.title, show.watching_profiles, show.total_events
        )?;
    }
    writeln!(writer, "Trending (last 30 days)")?;
    for show in report.trending_shows.iter().take(10) {
        writeln!(
            writer,
            "- {} ({} events)",
            show.title, show.events_last_30_days
        )?;
    }
    writeln!(writer, "Most watched movies")?;
    for movie in report.movies.iter().take(10) {
        writeln!(
            writer,
            "- {} ({} profiles)",
            movie.title, movie.watching_profiles
        )?;
    }
    Ok(())
}
