//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Personal watch tracker.
///
/// Tracks what you watch across shows and movies and computes watch-status
/// rollups, progress, streaks, binges, and milestones from the event log.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize the database, optionally seeding an account and profile.
    Init {
        /// Create an account with this name.
        #[arg(long)]
        account: Option<String>,

        /// Create a profile with this name (requires --account).
        #[arg(long)]
        profile: Option<String>,
    },

    /// Import catalog content, favorites, and watch events from JSON on stdin.
    Import,

    /// Mark an episode or movie as watched.
    Watch {
        /// Profile recording the watch.
        #[arg(long)]
        profile: String,

        /// Episode ID to mark.
        #[arg(long, conflicts_with = "movie")]
        episode: Option<String>,

        /// Movie ID to mark.
        #[arg(long)]
        movie: Option<String>,

        /// Watch time (RFC 3339); defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Remove a watch mark from an episode or movie.
    Unwatch {
        /// Profile that recorded the watch.
        #[arg(long)]
        profile: String,

        /// Episode ID to unmark.
        #[arg(long, conflicts_with = "movie")]
        episode: Option<String>,

        /// Movie ID to unmark.
        #[arg(long)]
        movie: Option<String>,
    },

    /// Add a show or movie to a profile.
    Favorite {
        /// Profile to add to.
        #[arg(long)]
        profile: String,

        /// Show ID to add.
        #[arg(long, conflicts_with = "movie")]
        show: Option<String>,

        /// Movie ID to add.
        #[arg(long)]
        movie: Option<String>,
    },

    /// Compute statistics for a profile or account.
    Stats {
        #[command(subcommand)]
        scope: StatsScope,
    },

    /// Platform-wide statistics across all accounts.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Recompute and cache statistics for every profile and account.
    Refresh,

    /// Show a database overview.
    Status,
}

/// Statistics scopes.
#[derive(Debug, Subcommand)]
pub enum StatsScope {
    /// Statistics for one profile.
    Profile {
        /// Profile ID.
        id: String,

        /// Comma-separated enhanced sections
        /// (timeline,velocity,binges,streaks,milestones,risk) or "all".
        #[arg(long)]
        sections: Option<String>,

        /// Emit JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Statistics for one account, aggregated across its profiles.
    Account {
        /// Account ID.
        id: String,

        /// Comma-separated enhanced sections, or "all".
        #[arg(long)]
        sections: Option<String>,

        /// Emit JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

/// Admin report types.
#[derive(Debug, Subcommand)]
pub enum AdminAction {
    /// Platform overview: accounts, profiles, activity.
    Overview {
        /// Emit JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Accounts ranked by recent activity, with health figures.
    Rankings {
        /// Emit JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Content popularity and trending across accounts.
    Content {
        /// Emit JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}
