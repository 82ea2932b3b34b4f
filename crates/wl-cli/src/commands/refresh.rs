//! Refresh command: batch recompute of the statistics cache.
//!
//! Failures are isolated per entity: a profile or account whose cache write
//! keeps failing after a bounded retry is logged and skipped, leaving its
//! last-known-good cache row in place, and never aborts the rest of the
//! batch.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use wl_core::compose::{account_statistics, profile_statistics, AnalyzerConfig, SectionRequest};
use wl_core::timeline::TimelineConfig;
use wl_db::{CachedStats, Database};

/// Outcome of one refresh pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStats {
    pub profiles_refreshed: usize,
    pub accounts_refreshed: usize,
    pub failed: usize,
}

/// Bounded retry for per-entity refresh jobs.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn backoff_millis(policy: &RetryPolicy, attempt: u32) -> u64 {
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms)
}

fn with_retry<T>(policy: &RetryPolicy, mut job: impl FnMut() -> Result<T>) -> Result<T> {
    let attempts = policy.max_attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match job() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt < attempts {
                    let delay_ms = backoff_millis(policy, attempt);
                    tracing::warn!(%error, attempt, delay_ms, "refresh job failed, retrying");
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
                last = Some(error);
            }
        }
    }
    Err(last.unwrap_or_else(|| anyhow::anyhow!("refresh job produced no result")))
}

pub fn run<W: Write>(writer: &mut W, db: &Database, now: DateTime<Utc>) -> Result<RefreshStats> {
    let request = SectionRequest::all();
    let policy = RetryPolicy::default();
    let mut stats = RefreshStats::default();

    for (account, _name) in db.list_accounts()? {
        let snapshots = match db.load_account_snapshots(&account, now) {
            Ok(snapshots) => snapshots,
            Err(error) => {
                tracing::warn!(account = account.as_str(), %error, "skipping account refresh");
                stats.failed += 1;
                continue;
            }
        };

        for (profile, snapshot) in &snapshots {
            let record = match db.get_profile(profile) {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!(profile = profile.as_str(), %error, "skipping profile refresh");
                    stats.failed += 1;
                    continue;
                }
            };
            let config = AnalyzerConfig {
                timeline: TimelineConfig {
                    utc_offset_minutes: record.utc_offset_minutes,
                },
                ..AnalyzerConfig::default()
            };
            let computed = profile_statistics(profile, snapshot, &request, &config);
            let result = with_retry(&policy, || {
                let payload = serde_json::to_string(&computed)?;
                db.put_cached_stats(
                    "profile",
                    profile.as_str(),
                    &CachedStats {
                        content_hash: snapshot.content_hash(),
                        computed_at: now,
                        payload,
                    },
                )?;
                Ok(())
            });
            match result {
                Ok(()) => stats.profiles_refreshed += 1,
                Err(error) => {
                    tracing::warn!(profile = profile.as_str(), %error, "failed to cache profile statistics");
                    stats.failed += 1;
                }
            }
        }

        let computed = account_statistics(&account, &snapshots, &request, &AnalyzerConfig::default());
        let hash = super::stats::account_content_hash(&snapshots);
        let result = with_retry(&policy, || {
            let payload = serde_json::to_string(&computed)?;
            db.put_cached_stats(
                "account",
                account.as_str(),
                &CachedStats {
                    content_hash: hash,
                    computed_at: now,
                    payload,
                },
            )?;
            Ok(())
        });
        match result {
            Ok(()) => stats.accounts_refreshed += 1,
            Err(error) => {
                tracing::warn!(account = account.as_str(), %error, "failed to cache account statistics");
                stats.failed += 1;
            }
        }
    }

    writeln!(
        writer,
        "Refreshed {} profiles and {} accounts ({} failed).",
        stats.profiles_refreshed, stats.accounts_refreshed, stats.failed
    )?;
    Ok(stats)
}
