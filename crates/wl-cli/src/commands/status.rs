//! Status command: database overview.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use wl_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let counts = db.counts()?;

    writeln!(writer, "Watch tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(
        writer,
        "Accounts: {} / Profiles: {}",
        counts.accounts, counts.profiles
    )?;
    writeln!(
        writer,
        "Catalog: {} shows, {} episodes, {} movies",
        counts.shows, counts.episodes, counts.movies
    )?;
    writeln!(writer, "Favorites: {}", counts.favorites)?;
    writeln!(writer, "Watch events: {}", counts.watch_events)?;
    Ok(())
}
