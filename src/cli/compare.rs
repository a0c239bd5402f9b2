use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::count;
use crate::normalizer::AliasTable;
use crate::reconcile::{compare, write_catalog_csv, Finding};
use crate::settings::load_settings;
use crate::sheets::{open_sheet_source, read_rows};

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let aliases = AliasTable::new(&settings.place_aliases)?;
    let source = open_sheet_source(&settings)?;
    let catalog = read_rows(source.as_ref(), &settings.sheets.catalog)?;
    let operational = read_rows(source.as_ref(), &settings.sheets.operational)?;

    let report = compare(&catalog, &operational, &aliases);

    println!("{}", "EXACT (safe to normalize)".green().bold());
    let mut table = Table::new();
    table.set_header(vec!["Place", "Operational", "Catalog"]);
    for finding in &report.exact {
        if let Finding::Exact { place, operational, catalog } = finding {
            table.add_row(vec![Cell::new(place), Cell::new(operational), Cell::new(catalog)]);
        }
    }
    println!("{table}\n");

    println!("{}", "SIMILAR (verify by hand)".yellow().bold());
    let mut table = Table::new();
    table.set_header(vec!["Place", "Operational", "Catalog", "Score"]);
    for finding in &report.similar {
        if let Finding::Similar { place, operational, catalog, score } = finding {
            table.add_row(vec![
                Cell::new(place),
                Cell::new(operational),
                Cell::new(catalog),
                Cell::new(format!("{:.0}%", score * 100.0)),
            ]);
        }
    }
    println!("{table}\n");

    println!("{}", "NEW (not in catalog)".red().bold());
    let new_pairs = report.new_pairs();
    if new_pairs.is_empty() {
        println!("  none\n");
    } else {
        write_catalog_csv(std::io::stdout().lock(), new_pairs.iter().copied())?;
        println!();
    }

    println!(
        "{} operational locations: {} exact, {} similar, {} new",
        count(report.total()),
        count(report.exact.len()),
        count(report.similar.len()),
        count(report.new.len())
    );
    Ok(())
}
