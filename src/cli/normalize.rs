use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::count;
use crate::normalizer::AliasTable;
use crate::reconcile::alias_updates;
use crate::settings::load_settings;
use crate::sheets::{open_sheet_source, update_in_chunks};

/// Rows listed in a dry run before eliding the rest.
const PREVIEW_ROWS: usize = 20;

pub fn run(sheet: &str, column: &str, dry_run: bool) -> Result<()> {
    let settings = load_settings()?;
    let aliases = AliasTable::new(&settings.place_aliases)?;
    let source = open_sheet_source(&settings)?;

    let values = source.read_values(sheet)?;
    let updates = alias_updates(&values, column, &aliases)?;
    if updates.is_empty() {
        println!("Nothing to normalize in {sheet}!{column}.");
        return Ok(());
    }

    if dry_run {
        let mut table = Table::new();
        table.set_header(vec!["Cell", "Current", "Canonical"]);
        for update in updates.iter().take(PREVIEW_ROWS) {
            let current = values
                .get(update.row - 1)
                .and_then(|r| r.get(update.column - 1))
                .map(String::as_str)
                .unwrap_or("");
            table.add_row(vec![
                Cell::new(update.a1()),
                Cell::new(current),
                Cell::new(&update.value),
            ]);
        }
        println!("{table}");
        if updates.len() > PREVIEW_ROWS {
            println!("... and {} more", count(updates.len() - PREVIEW_ROWS));
        }
        println!("{} cells would change (dry run).", count(updates.len()));
        return Ok(());
    }

    let written = update_in_chunks(source.as_ref(), sheet, &updates)?;
    println!("{} cells normalized in {} ({}).", count(written), sheet, source.describe());
    Ok(())
}
