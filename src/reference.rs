use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::matcher::fold;
use crate::models::{LocationRecord, ReferenceEntry};

pub const KEY_SEPARATOR: char = '|';

/// The one canonical form of a (place, location) pair, used on both the
/// index-build and lookup sides.
pub fn canonical_key(place: &str, location: &str) -> String {
    format!("{}{KEY_SEPARATOR}{}", fold(place), fold(location))
}

/// Read access to the backend's locations collection.
pub trait LocationSource {
    fn fetch_locations(&self) -> Result<Vec<LocationRecord>>;
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, ReferenceEntry>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unless the key is taken; the first location registered wins.
    pub fn insert(&mut self, place: &str, location: &str, entry: ReferenceEntry) -> bool {
        let key = canonical_key(place, location);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn lookup(&self, place: &str, location: &str) -> Option<&ReferenceEntry> {
        self.entries.get(&canonical_key(place, location))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetches every location once and indexes it by place and location name.
/// A failed fetch aborts the run: no row can be resolved without the index.
pub fn build_reference_index(source: &impl LocationSource) -> Result<ReferenceIndex> {
    let locations = source.fetch_locations()?;
    let mut index = ReferenceIndex::new();
    let mut orphans = 0usize;

    for location in &locations {
        let (Some(place), Some(place_id)) = (&location.place, &location.place_id) else {
            debug!(location = %location.name, "location has no parent place; skipped");
            orphans += 1;
            continue;
        };
        let entry = ReferenceEntry {
            location_id: location.id.clone(),
            place_id: place_id.clone(),
        };
        if !index.insert(&place.name, &location.name, entry) {
            warn!(
                key = %canonical_key(&place.name, &location.name),
                id = %location.id,
                "duplicate location key; keeping first"
            );
        }
    }

    if index.is_empty() {
        warn!("no locations indexed; every row will be skipped");
    }
    info!(locations = locations.len(), indexed = index.len(), orphans, "reference index built");
    Ok(index)
}
