use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    CollectionHeader, CollectionLineItem, MaterialType, PendingCollection, SourceRow,
};
use crate::normalizer::AliasTable;
use crate::reference::{canonical_key, ReferenceIndex};
use crate::reporter::Progress;
use crate::settings::{Columns, EmptyCollectionPolicy};

/// Everything a transformation run needs, built once at startup.
pub struct MigrationContext {
    pub index: ReferenceIndex,
    pub aliases: AliasTable,
    pub materials: Vec<MaterialType>,
    pub columns: Columns,
    pub submitter_id: String,
    pub empty_collections: EmptyCollectionPolicy,
}

/// Why a row produced no collection. Row-level, never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("missing {0}")]
    MissingField(String),
    #[error("location not found: {0}")]
    LocationNotFound(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("no material weights")]
    NoMaterials,
}

// chrono's %Y takes any digit count; both shapes pin the year to four digits.
static DATE_SHAPES: Lazy<[(Regex, &'static str); 2]> = Lazy::new(|| {
    [
        (Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("static regex"), "%d/%m/%Y"),
        (Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("static regex"), "%Y-%m-%d"),
    ]
});

/// Accepts `DD/MM/YYYY`, falling back to `YYYY-MM-DD`; always returns ISO.
/// Two-digit and zero-padded short years are rejected.
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    DATE_SHAPES
        .iter()
        .filter(|(shape, _)| shape.is_match(raw))
        .find_map(|(_, fmt)| NaiveDate::parse_from_str(raw, fmt).ok())
        .filter(|d| d.year() >= 1000)
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Locale-tolerant weight: decimal comma accepted. Only positive finite
/// values count; anything else means the material is absent.
pub fn parse_weight(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', ".");
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|w| w.is_finite() && *w > 0.0)
}

pub fn transform_row(
    row: &SourceRow,
    ctx: &MigrationContext,
) -> Result<(CollectionHeader, Vec<CollectionLineItem>), SkipReason> {
    let place_raw = row.get(&ctx.columns.place).trim();
    let location = row.get(&ctx.columns.location).trim();
    let date_raw = row.get(&ctx.columns.date).trim();
    for (column, value) in [
        (&ctx.columns.place, place_raw),
        (&ctx.columns.location, location),
        (&ctx.columns.date, date_raw),
    ] {
        if value.is_empty() {
            return Err(SkipReason::MissingField(column.clone()));
        }
    }

    let place = ctx.aliases.normalize(place_raw);
    let entry = ctx
        .index
        .lookup(place, location)
        .ok_or_else(|| SkipReason::LocationNotFound(canonical_key(place, location)))?;

    let collection_date =
        parse_date(date_raw).ok_or_else(|| SkipReason::InvalidDate(date_raw.to_string()))?;

    let header = CollectionHeader {
        submitter_id: ctx.submitter_id.clone(),
        place_id: entry.place_id.clone(),
        location_id: entry.location_id.clone(),
        collection_date,
        notes: None,
    };

    let items = ctx
        .materials
        .iter()
        .filter_map(|material| {
            let weight = parse_weight(row.get(&material.name))?;
            Some(CollectionLineItem {
                collection_id: None,
                material_type_id: material.id.clone(),
                weight_kg: weight,
                emissions_avoided: weight * material.emissions_factor,
            })
        })
        .collect();

    Ok((header, items))
}

fn content_hash(header: &CollectionHeader, items: &[CollectionLineItem]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(header.place_id.as_bytes());
    hasher.update(b"|");
    hasher.update(header.location_id.as_bytes());
    hasher.update(b"|");
    hasher.update(header.collection_date.as_bytes());
    for item in items {
        hasher.update(format!("|{}={}", item.material_type_id, item.weight_kg).as_bytes());
    }
    hex::encode(hasher.finalize())
}

pub struct Prepared {
    pub collections: Vec<PendingCollection>,
    pub skipped: usize,
}

/// Transforms every row, applies the empty-collection policy and stamps each
/// kept collection with a deterministic fingerprint. Identical events get an
/// occurrence suffix so they stay distinct across re-runs.
pub fn prepare(rows: &[SourceRow], ctx: &MigrationContext, progress: &mut Progress) -> Prepared {
    let mut collections = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let total = rows.len();

    for (n, row) in rows.iter().enumerate() {
        let outcome = transform_row(row, ctx).and_then(|(header, items)| {
            if items.is_empty() && ctx.empty_collections == EmptyCollectionPolicy::Drop {
                Err(SkipReason::NoMaterials)
            } else {
                Ok((header, items))
            }
        });

        match outcome {
            Ok((header, items)) => {
                let hash = content_hash(&header, &items);
                let occurrence = seen.entry(hash.clone()).or_insert(0);
                *occurrence += 1;
                collections.push(PendingCollection {
                    row_index: row.index,
                    fingerprint: format!("{hash}#{occurrence}"),
                    header,
                    items,
                });
                progress.success(1);
            }
            Err(reason) => {
                debug!(row = row.index, %reason, "row skipped");
                progress.failure(1, format!("row {}: {reason}", row.index));
            }
        }
        progress.tick(n + 1, total);
    }

    let skipped = total - collections.len();
    Prepared { collections, skipped }
}
