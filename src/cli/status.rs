use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::count;
use crate::ledger::summarize;
use crate::normalizer::AliasTable;
use crate::settings::{load_settings, settings_path};

fn show(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "(not set)",
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let aliases = AliasTable::new(&settings.place_aliases)?;
    let path = settings_path();
    let db_path = settings.ledger_path();

    println!(
        "Settings:   {}{}",
        path.display(),
        if path.exists() { "" } else { " (missing, using defaults)" }
    );
    println!("Store:      {}", show(settings.store_url.as_deref()));
    println!(
        "Store key:  {}",
        if settings.store_key.is_some() { "set" } else { "(not set)" }
    );
    println!("Submitter:  {}", show(Some(&settings.submitter_id)));
    match settings.sheet_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => println!("Sheets:     {dir}"),
        _ => {
            println!("Sheets:     {}", show(settings.sheet_id.as_deref()));
            println!(
                "Sheets key: {}",
                if settings.sheets_token().is_ok() { "set" } else { "(not set)" }
            );
        }
    }
    println!("Batch size: {}", settings.batch_size);
    println!("Aliases:    {}", aliases.len());
    println!("Materials:  {}", settings.materials.len());
    println!("Ledger:     {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Ledger not found. Run `haul init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let files = summarize(&conn)?;
    if files.is_empty() {
        println!();
        println!("No rows migrated yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Source file", "Rows", "Last migrated"]);
    for (file, rows, last) in &files {
        table.add_row(vec![
            Cell::new(file),
            Cell::new(count(*rows as usize)),
            Cell::new(last),
        ]);
    }
    println!();
    println!("{table}");
    Ok(())
}
