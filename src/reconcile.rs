use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;

use crate::error::{HaulError, Result};
use crate::matcher::{classify, MatchBucket};
use crate::models::SourceRow;
use crate::normalizer::AliasTable;
use crate::reference::canonical_key;
use crate::sheets::CellUpdate;

pub const CATALOG_PLACE: &str = "Plaza_Nombre";
pub const CATALOG_LOCATION: &str = "Nombre_Local";
pub const CATALOG_LOCATION_FALLBACK: &str = "LOCAL";
pub const OPERATIONAL_PLACE: &str = "Plaza";
pub const OPERATIONAL_LOCATION: &str = "Local";

/// Catalog locations grouped by canonical place label, in sheet order.
pub fn catalog_by_place(rows: &[SourceRow], aliases: &AliasTable) -> BTreeMap<String, Vec<String>> {
    let mut by_place: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let place = aliases.normalize(row.get(CATALOG_PLACE));
        let mut location = row.get(CATALOG_LOCATION).trim();
        if location.is_empty() {
            location = row.get(CATALOG_LOCATION_FALLBACK).trim();
        }
        if place.is_empty() || location.is_empty() {
            continue;
        }
        by_place
            .entry(place.to_string())
            .or_default()
            .push(location.to_string());
    }
    by_place
}

/// Distinct operational locations grouped by canonical place label.
pub fn operational_by_place(
    rows: &[SourceRow],
    aliases: &AliasTable,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut by_place: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        let place = aliases.normalize(row.get(OPERATIONAL_PLACE));
        let location = row.get(OPERATIONAL_LOCATION).trim();
        if place.is_empty() || location.is_empty() {
            continue;
        }
        by_place
            .entry(place.to_string())
            .or_default()
            .insert(location.to_string());
    }
    by_place
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Exact {
        place: String,
        operational: String,
        catalog: String,
    },
    Similar {
        place: String,
        operational: String,
        catalog: String,
        score: f64,
    },
    New {
        place: String,
        location: String,
    },
}

#[derive(Debug, Default)]
pub struct Comparison {
    pub exact: Vec<Finding>,
    pub similar: Vec<Finding>,
    pub new: Vec<Finding>,
}

impl Comparison {
    pub fn total(&self) -> usize {
        self.exact.len() + self.similar.len() + self.new.len()
    }

    /// New locations as (place, location) pairs, sorted.
    pub fn new_pairs(&self) -> Vec<(&str, &str)> {
        self.new
            .iter()
            .filter_map(|f| match f {
                Finding::New { place, location } => Some((place.as_str(), location.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Buckets every operational location against the catalog of its place.
/// Advisory only; nothing is renamed.
pub fn compare(catalog: &[SourceRow], operational: &[SourceRow], aliases: &AliasTable) -> Comparison {
    let catalog = catalog_by_place(catalog, aliases);
    let operational = operational_by_place(operational, aliases);
    let no_candidates: Vec<String> = Vec::new();
    let mut report = Comparison::default();

    for (place, locations) in &operational {
        let candidates = catalog.get(place).unwrap_or(&no_candidates);
        for location in locations {
            let found = classify(location, candidates);
            match (found.bucket, found.candidate) {
                (MatchBucket::Exact, Some(catalog)) => report.exact.push(Finding::Exact {
                    place: place.clone(),
                    operational: location.clone(),
                    catalog: catalog.to_string(),
                }),
                (MatchBucket::Similar, Some(catalog)) => report.similar.push(Finding::Similar {
                    place: place.clone(),
                    operational: location.clone(),
                    catalog: catalog.to_string(),
                    score: found.score,
                }),
                _ => report.new.push(Finding::New {
                    place: place.clone(),
                    location: location.clone(),
                }),
            }
        }
    }
    report
}

/// Operational (place, location) pairs with no catalog entry under the
/// canonical key.
pub fn missing(
    catalog: &[SourceRow],
    operational: &[SourceRow],
    aliases: &AliasTable,
) -> BTreeMap<String, BTreeSet<String>> {
    let known: HashSet<String> = catalog_by_place(catalog, aliases)
        .iter()
        .flat_map(|(place, locations)| locations.iter().map(move |l| canonical_key(place, l)))
        .collect();

    let mut absent: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (place, locations) in operational_by_place(operational, aliases) {
        for location in locations {
            if !known.contains(&canonical_key(&place, &location)) {
                absent.entry(place.clone()).or_default().insert(location);
            }
        }
    }
    absent
}

/// Writes pairs in the catalog sheet's import layout.
pub fn write_catalog_csv<'a, W, I>(writer: W, pairs: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([CATALOG_PLACE, CATALOG_LOCATION])?;
    for (place, location) in pairs {
        wtr.write_record([place, location])?;
    }
    wtr.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Label normalization inside a sheet
// ---------------------------------------------------------------------------

/// Cell updates rewriting every aliased value in the column headed `column`.
/// `values` is the raw sheet, header row first.
pub fn alias_updates(
    values: &[Vec<String>],
    column: &str,
    aliases: &AliasTable,
) -> Result<Vec<CellUpdate>> {
    let header = values
        .first()
        .ok_or_else(|| HaulError::Sheet("sheet is empty".into()))?;
    let col = header
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
        .ok_or_else(|| HaulError::Sheet(format!("no column named '{column}'")))?;

    Ok(values
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, row)| {
            let current = row.get(col)?;
            aliases.rewrite(current).map(|canonical| CellUpdate {
                row: i + 1,
                column: col + 1,
                value: canonical.to_string(),
            })
        })
        .collect())
}
