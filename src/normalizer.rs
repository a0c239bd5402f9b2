use std::collections::{BTreeMap, HashMap};

use crate::error::{HaulError, Result};

/// Literal place-label aliases mapped to their canonical spelling.
///
/// Only place labels go through this table. Location names are an open set
/// and are matched as-is (modulo key canonicalization).
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Builds the table, rejecting chains (`A -> B`, `B -> C`) so that every
    /// canonical value is a fixed point.
    pub fn new(entries: &BTreeMap<String, String>) -> Result<Self> {
        let aliases: HashMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        for (alias, canonical) in &aliases {
            if canonical.is_empty() {
                return Err(HaulError::InvalidAlias(format!("'{alias}' maps to an empty label")));
            }
            if let Some(next) = aliases.get(canonical) {
                if next != canonical {
                    return Err(HaulError::InvalidAlias(format!(
                        "'{alias}' -> '{canonical}' -> '{next}' is a chain"
                    )));
                }
            }
        }
        Ok(Self { aliases })
    }

    pub fn normalize<'a>(&'a self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim();
        self.aliases
            .get(trimmed)
            .map(String::as_str)
            .unwrap_or(trimmed)
    }

    /// Canonical value when `raw` is a known alias that actually changes.
    pub fn rewrite(&self, raw: &str) -> Option<&str> {
        self.aliases
            .get(raw.trim())
            .map(String::as_str)
            .filter(|canonical| *canonical != raw)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> Result<AliasTable> {
        let map = pairs
            .iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect();
        AliasTable::new(&map)
    }

    #[test]
    fn test_known_alias_is_rewritten() {
        let t = table(&[("Plaza_Américas_Playa", "Plaza Américas - Playa")]).unwrap();
        assert_eq!(t.normalize("Plaza_Américas_Playa"), "Plaza Américas - Playa");
        assert_eq!(t.normalize("  Plaza_Américas_Playa "), "Plaza Américas - Playa");
    }

    #[test]
    fn test_unknown_label_passes_through_trimmed() {
        let t = table(&[("PLAZA MALL", "Plaza Mall")]).unwrap();
        assert_eq!(t.normalize(" Otra Plaza "), "Otra Plaza");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let t = table(&[
            ("PLAZA MALL", "Plaza Mall"),
            ("Plaza Mall", "Plaza Mall"),
            ("PUERTO CANCUN", "Plaza Puerto Cancún"),
        ])
        .unwrap();
        for raw in ["PLAZA MALL", "Plaza Mall", "PUERTO CANCUN", "unknown", " x "] {
            let once = t.normalize(raw).to_string();
            assert_eq!(t.normalize(&once), once);
        }
    }

    #[test]
    fn test_chains_are_rejected() {
        let err = table(&[("A", "B"), ("B", "C")]).unwrap_err();
        assert!(matches!(err, HaulError::InvalidAlias(_)));
    }

    #[test]
    fn test_rewrite_only_reports_changes() {
        let t = table(&[("PLAZA MALL", "Plaza Mall"), ("Plaza Mall", "Plaza Mall")]).unwrap();
        assert_eq!(t.rewrite("PLAZA MALL"), Some("Plaza Mall"));
        assert_eq!(t.rewrite("Plaza Mall"), None);
        assert_eq!(t.rewrite("Elsewhere"), None);
    }

    #[test]
    fn test_default_aliases_are_valid() {
        let settings = crate::settings::Settings::default();
        let t = AliasTable::new(&settings.place_aliases).unwrap();
        assert_eq!(t.normalize("Plaza puerto cancun"), "Plaza Puerto Cancún");
    }
}
