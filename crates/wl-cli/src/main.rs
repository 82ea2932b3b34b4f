use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wl_cli::commands::{admin, import, init, mark, refresh, stats, status};
use wl_cli::{AdminAction, Cli, Commands, Config, StatsScope};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(wl_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = wl_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init avoids a panic when tracing is already initialized in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();
    let now = Utc::now();

    match &cli.command {
        Some(Commands::Init { account, profile }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            init::run(&mut stdout, &db, account.as_deref(), profile.as_deref())?;
        }
        Some(Commands::Import) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let imported = import::run(io::stdin().lock(), &mut db)?;
            writeln!(
                stdout,
                "Imported {} shows, {} movies, {} favorites, {} events.",
                imported.shows, imported.movies, imported.favorites, imported.events
            )?;
        }
        Some(Commands::Watch {
            profile,
            episode,
            movie,
            at,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            mark::watch(
                &mut stdout,
                &db,
                profile,
                episode.as_deref(),
                movie.as_deref(),
                at.as_deref(),
            )?;
        }
        Some(Commands::Unwatch {
            profile,
            episode,
            movie,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            mark::unwatch(&mut stdout, &db, profile, episode.as_deref(), movie.as_deref())?;
        }
        Some(Commands::Favorite {
            profile,
            show,
            movie,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            mark::favorite(&mut stdout, &db, profile, show.as_deref(), movie.as_deref())?;
        }
        Some(Commands::Stats { scope }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match scope {
                StatsScope::Profile { id, sections, json } => {
                    stats::run_profile(&mut stdout, &db, id, sections.as_deref(), *json, now)?;
                }
                StatsScope::Account { id, sections, json } => {
                    stats::run_account(&mut stdout, &db, id, sections.as_deref(), *json, now)?;
                }
            }
        }
        Some(Commands::Admin { action }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                AdminAction::Overview { json } => admin::overview(&mut stdout, &db, *json, now)?,
                AdminAction::Rankings { json } => admin::rankings(&mut stdout, &db, *json, now)?,
                AdminAction::Content { json } => admin::content(&mut stdout, &db, *json, now)?,
            }
        }
        Some(Commands::Refresh) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            refresh::run(&mut stdout, &db, now)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
