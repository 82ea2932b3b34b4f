//! Init command: creates the database and optionally seeds an account and
//! profile with generated IDs.

use std::io::Write;

use anyhow::{bail, Result};
use uuid::Uuid;

use wl_core::types::{AccountId, ProfileId};
use wl_db::{Database, ProfileRecord};

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    account: Option<&str>,
    profile: Option<&str>,
) -> Result<()> {
    writeln!(writer, "Database initialized.")?;

    let account_id = match account {
        Some(name) => {
            let id = AccountId::new(Uuid::new_v4().to_string())?;
            db.upsert_account(&id, name)?;
            writeln!(writer, "Account '{name}' created: {id}")?;
            Some(id)
        }
        None => None,
    };

    if let Some(name) = profile {
        let Some(account_id) = account_id else {
            bail!("--profile requires --account");
        };
        let id = ProfileId::new(Uuid::new_v4().to_string())?;
        db.upsert_profile(&ProfileRecord {
            id: id.clone(),
            account: account_id,
            name: name.to_string(),
            utc_offset_minutes: 0,
        })?;
        writeln!(writer, "Profile '{name}' created: {id}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_seeds_account_and_profile() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, Some("Family"), Some("Sam")).unwrap();

        let accounts = db.list_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].1, "Family");
        let profiles = db.list_profiles(&accounts[0].0).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "Sam");
    }

    #[test]
    fn profile_without_account_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let err = run(&mut output, &db, None, Some("Sam")).unwrap_err();
        assert!(err.to_string().contains("--profile requires --account"));
    }
}
