use colored::Colorize;

use crate::error::Result;
use crate::fmt::count;
use crate::normalizer::AliasTable;
use crate::reconcile::{missing, write_catalog_csv};
use crate::settings::load_settings;
use crate::sheets::{open_sheet_source, read_rows};

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let aliases = AliasTable::new(&settings.place_aliases)?;
    let source = open_sheet_source(&settings)?;
    let catalog = read_rows(source.as_ref(), &settings.sheets.catalog)?;
    let operational = read_rows(source.as_ref(), &settings.sheets.operational)?;

    let absent = missing(&catalog, &operational, &aliases);
    if absent.is_empty() {
        println!("Every operational location is in {}.", settings.sheets.catalog);
        return Ok(());
    }

    let mut total = 0usize;
    for (place, locations) in &absent {
        println!("{} ({})", place.bold(), count(locations.len()));
        for location in locations {
            println!("  {location}");
        }
        total += locations.len();
    }

    println!();
    write_catalog_csv(
        std::io::stdout().lock(),
        absent
            .iter()
            .flat_map(|(place, locations)| locations.iter().map(move |l| (place.as_str(), l.as_str()))),
    )?;
    println!();
    println!(
        "{} locations missing from {} across {} places",
        count(total),
        settings.sheets.catalog,
        count(absent.len())
    );
    Ok(())
}
