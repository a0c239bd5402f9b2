use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::{HaulError, Result};
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(data_dir: Option<String>, submitter: Option<String>, force: bool) -> Result<()> {
    let path = settings_path();
    if path.exists() && !force {
        return Err(HaulError::Config(format!(
            "{} already exists\nEdit it directly or re-run with --force.",
            path.display()
        )));
    }

    let mut settings = if force { load_settings()? } else { Default::default() };
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(id) = submitter {
        settings.submitter_id = id;
    }

    let data_dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let conn = get_connection(&settings.ledger_path())?;
    init_db(&conn)?;
    let written = save_settings(&settings)?;

    println!("Settings:   {}", written.display());
    println!("Data dir:   {}", data_dir.display());
    println!("Ledger:     {}", settings.ledger_path().display());
    println!();
    println!("Set store_url, store_key and sheet_id (or sheet_dir) before running `haul migrate`.");
    Ok(())
}
