use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{HaulError, Result};
use crate::models::MaterialType;

/// Upstream ceiling on rows per insert request.
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmptyCollectionPolicy {
    /// Skip collections that carry no material weights.
    Drop,
    /// Insert the header even when it has no line items.
    Submit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Columns {
    pub date: String,
    pub place: String,
    pub location: String,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            date: "Fecha".to_string(),
            place: "Plaza".to_string(),
            location: "Local_Consolidado".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetNames {
    pub catalog: String,
    pub operational: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            catalog: "CAT_LOCALES".to_string(),
            operational: "OPERATIVO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store_url: Option<String>,
    pub store_key: Option<String>,
    pub sheet_id: Option<String>,
    /// Local workbook (directory of `<sheet>.csv`, or an `.xlsx` file) used
    /// instead of the remote spreadsheet when set.
    pub sheet_dir: Option<String>,
    pub sheets_token_file: Option<String>,
    /// From `HAUL_SHEETS_TOKEN` only; never written to the settings file.
    #[serde(skip)]
    pub sheets_token: Option<String>,
    pub submitter_id: String,
    pub data_dir: String,
    pub batch_size: usize,
    pub empty_collections: EmptyCollectionPolicy,
    pub http_timeout_secs: Option<u64>,
    pub columns: Columns,
    pub sheets: SheetNames,
    pub place_aliases: BTreeMap<String, String>,
    pub materials: Vec<MaterialType>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            store_key: None,
            sheet_id: None,
            sheet_dir: None,
            sheets_token_file: None,
            sheets_token: None,
            submitter_id: String::new(),
            data_dir: default_data_dir().to_string_lossy().to_string(),
            batch_size: 500,
            empty_collections: EmptyCollectionPolicy::Drop,
            http_timeout_secs: None,
            columns: Columns::default(),
            sheets: SheetNames::default(),
            place_aliases: default_place_aliases(),
            materials: default_materials(),
        }
    }
}

fn default_place_aliases() -> BTreeMap<String, String> {
    const MALECON: &str = "Plaza Américas - Malecón";
    const PLAYA: &str = "Plaza Américas - Playa";
    const MALL: &str = "Plaza Mall";
    const PUERTO: &str = "Plaza Puerto Cancún";
    [
        ("Plaza_Américas_Malecón", MALECON),
        ("Plaza_Américas_Malecon", MALECON),
        ("Plaza Américas_Malecón", MALECON),
        ("Plaza_Américas_Playa", PLAYA),
        ("Plaza Américas_Playa", PLAYA),
        ("PLAZA MALL", MALL),
        ("Plaza mall", MALL),
        ("PLAZA PUERTO CANCUN", PUERTO),
        ("Plaza puerto cancun", PUERTO),
        ("PUERTO CANCUN", PUERTO),
        ("Plaza Puerto Cancun", PUERTO),
    ]
    .into_iter()
    .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
    .collect()
}

// (column, id, emissions factor in kg CO2e per kg)
const DEFAULT_MATERIALS: &[(&str, &str, f64)] = &[
    ("Organico", "e1034c62-bd59-4182-bed0-e517bd1f17f6", 0.1),
    ("Inorganico", "a23b0971-7711-4cdd-92ce-d0081ff72aeb", 0.5),
    ("Carton", "85bb91f7-e2e1-4ed9-8e72-45a705224456", 1.5),
    ("Aluminio", "ec3cfb20-82f2-4fa0-bd5c-b4c85a15156e", 1.2),
    ("Archivo", "9b008fe7-fbd3-4472-8a3e-65f4af431a5e", 1.5),
    ("Plastico_Duro", "24267f9c-377e-4d56-8620-9107250bf7bd", 2.0),
    ("Pet", "b2db9ca3-efa8-47fe-a398-00080390eaba", 1.8),
    ("Playo", "18abec8c-0eca-4ac3-94a2-96e29575ab6f", 2.0),
    ("Vidrio", "93077770-4e38-491f-9434-e00f1641d4f7", 0.5),
    ("Tetra_Pak", "8096049e-02ed-4221-a25b-f25c96b92232", 1.3),
    ("Chatarra", "733dda8e-f01a-42dd-a83f-c65e781493fc", 1.2),
];

fn default_materials() -> Vec<MaterialType> {
    DEFAULT_MATERIALS
        .iter()
        .map(|(name, id, factor)| MaterialType {
            id: id.to_string(),
            name: name.to_string(),
            emissions_factor: *factor,
        })
        .collect()
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("haul")
}

pub fn settings_path() -> PathBuf {
    match std::env::var_os("HAUL_CONFIG") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join("settings.json"),
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haul")
}

/// Endpoint and key for the target store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Validated store settings; a missing URL or key is fatal.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let url = non_empty(self.store_url.as_deref())
            .ok_or_else(|| HaulError::Config("store_url is not set (HAUL_STORE_URL)".into()))?;
        let key = non_empty(self.store_key.as_deref())
            .ok_or_else(|| HaulError::Config("store_key is not set (HAUL_STORE_KEY)".into()))?;
        Ok(StoreConfig {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            timeout_secs: self.http_timeout_secs,
        })
    }

    pub fn validate_batch_size(&self, override_size: Option<usize>) -> Result<usize> {
        let size = override_size.unwrap_or(self.batch_size);
        if size == 0 || size > MAX_BATCH_SIZE {
            return Err(HaulError::Config(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {size}"
            )));
        }
        Ok(size)
    }

    pub fn require_submitter(&self) -> Result<&str> {
        non_empty(Some(&self.submitter_id))
            .ok_or_else(|| HaulError::Config("submitter_id is not set".into()))
    }

    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("haul.db")
    }

    /// Bearer token for the spreadsheet API: the environment wins over
    /// `sheets_token_file`.
    pub fn sheets_token(&self) -> Result<String> {
        if let Some(token) = non_empty(self.sheets_token.as_deref()) {
            return Ok(token.to_string());
        }
        let file = non_empty(self.sheets_token_file.as_deref()).ok_or_else(|| {
            HaulError::Config("no spreadsheet token (HAUL_SHEETS_TOKEN or sheets_token_file)".into())
        })?;
        let path = shellexpand_path(file);
        let token = std::fs::read_to_string(&path)
            .map_err(|e| HaulError::Config(format!("cannot read token file {path}: {e}")))?;
        Ok(token.trim().to_string())
    }

    fn apply_env(&mut self) {
        self.apply_overrides(env_value);
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HAUL_STORE_URL") {
            self.store_url = Some(v);
        }
        if let Some(v) = lookup("HAUL_STORE_KEY") {
            self.store_key = Some(v);
        }
        if let Some(v) = lookup("HAUL_SHEET_ID") {
            self.sheet_id = Some(v);
        }
        if let Some(v) = lookup("HAUL_SHEETS_TOKEN") {
            self.sheets_token = Some(v);
        }
        if let Some(v) = lookup("HAUL_DATA_DIR") {
            self.data_dir = v;
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Settings file merged with defaults, then environment overrides.
/// A malformed file is a configuration error rather than a silent reset.
pub fn load_settings() -> Result<Settings> {
    let path = settings_path();
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            HaulError::Config(format!("{}: {e}", path.display()))
        })?
    } else {
        Settings::default()
    };
    settings.apply_env();
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let path = settings_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
