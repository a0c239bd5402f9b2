use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Backend identifiers a (place, location) label pair resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub location_id: String,
    pub place_id: String,
}

/// One location row as served by the backend, with its parent place embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "plaza_id", default)]
    pub place_id: Option<String>,
    #[serde(rename = "plazas", default)]
    pub place: Option<PlaceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceRef {
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: String,
    /// Column header carrying this material's weight in the CSV export.
    pub name: String,
    pub emissions_factor: f64,
}

/// Raw input record. `index` is the 1-based data row number (header excluded).
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    pub index: usize,
    pub fields: HashMap<String, String>,
}

impl SourceRow {
    pub fn new(index: usize, fields: HashMap<String, String>) -> Self {
        Self { index, fields }
    }

    /// Value of `column`, or "" when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionHeader {
    #[serde(rename = "usuario_id")]
    pub submitter_id: String,
    #[serde(rename = "plaza_id")]
    pub place_id: String,
    #[serde(rename = "local_id")]
    pub location_id: String,
    #[serde(rename = "fecha_recoleccion")]
    pub collection_date: String,
    #[serde(rename = "notas")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionLineItem {
    #[serde(rename = "recoleccion_id")]
    pub collection_id: Option<String>,
    #[serde(rename = "tipo_residuo_id")]
    pub material_type_id: String,
    #[serde(rename = "kilos")]
    pub weight_kg: f64,
    #[serde(rename = "co2_evitado")]
    pub emissions_avoided: f64,
}

/// A transformed row waiting to be loaded.
#[derive(Debug, Clone)]
pub struct PendingCollection {
    pub row_index: usize,
    pub fingerprint: String,
    pub header: CollectionHeader,
    pub items: Vec<CollectionLineItem>,
}
