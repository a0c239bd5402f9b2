use std::path::Path;

use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::models::PendingCollection;

/// Outcome of checking a run's collections against the ledger.
#[derive(Debug, Default)]
pub struct LedgerSplit {
    /// Never loaded.
    pub fresh: Vec<PendingCollection>,
    /// Header loaded earlier but its line items never landed, with the
    /// collection id the store assigned.
    pub resend: Vec<(PendingCollection, String)>,
    /// Fully loaded by an earlier run.
    pub already: usize,
}

/// Local record of which source rows already reached the target store.
pub struct Ledger {
    conn: Connection,
    source_file: String,
}

impl Ledger {
    pub fn open(db_path: &Path, source_file: &str) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self {
            conn,
            source_file: source_file.to_string(),
        })
    }

    /// Records a loaded header. A collection without line items is complete
    /// at this point; otherwise it waits for [`Ledger::mark_items_loaded`].
    pub fn record(&self, collection: &PendingCollection, collection_id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO migrated_rows \
             (fingerprint, collection_id, source_file, row_index, items_loaded) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                collection.fingerprint,
                collection_id,
                self.source_file,
                collection.row_index as i64,
                collection.items.is_empty()
            ],
        )?;
        Ok(())
    }

    pub fn mark_items_loaded(&self, fingerprint: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE migrated_rows SET items_loaded = 1 WHERE fingerprint = ?1",
            [fingerprint],
        )?;
        Ok(())
    }

    /// Stored collection id and whether its line items landed.
    pub fn lookup(&self, fingerprint: &str) -> Result<Option<(String, bool)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT collection_id, items_loaded FROM migrated_rows WHERE fingerprint = ?1",
        )?;
        let mut rows = stmt.query([fingerprint])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM migrated_rows", [], |r| r.get(0))?)
    }

    /// Splits a run's collections by what an earlier run already loaded.
    pub fn split(&self, collections: Vec<PendingCollection>) -> Result<LedgerSplit> {
        let mut split = LedgerSplit::default();
        for collection in collections {
            match self.lookup(&collection.fingerprint)? {
                None => split.fresh.push(collection),
                Some((_, true)) => split.already += 1,
                Some((id, false)) => split.resend.push((collection, id)),
            }
        }
        Ok(split)
    }
}

/// Per-file row counts, newest first.
pub fn summarize(conn: &Connection) -> Result<Vec<(String, i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(source_file, ''), count(*), max(migrated_at) FROM migrated_rows \
         GROUP BY source_file ORDER BY max(migrated_at) DESC",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionHeader, CollectionLineItem};

    fn pending(fingerprint: &str, row_index: usize) -> PendingCollection {
        with_items(fingerprint, row_index, 0)
    }

    fn with_items(fingerprint: &str, row_index: usize, count: usize) -> PendingCollection {
        PendingCollection {
            row_index,
            fingerprint: fingerprint.into(),
            header: CollectionHeader {
                submitter_id: "u".into(),
                place_id: "P1".into(),
                location_id: "L1".into(),
                collection_date: "2024-01-01".into(),
                notes: None,
            },
            items: (0..count)
                .map(|i| CollectionLineItem {
                    collection_id: None,
                    material_type_id: format!("m{i}"),
                    weight_kg: 1.0,
                    emissions_avoided: 0.1,
                })
                .collect(),
        }
    }

    fn test_ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(&dir.path().join("haul.db"), "recolecciones.csv").unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_record_and_lookup() {
        let (_dir, ledger) = test_ledger();
        assert!(ledger.lookup("abc#1").unwrap().is_none());
        ledger.record(&pending("abc#1", 1), "c-1").unwrap();
        assert_eq!(ledger.lookup("abc#1").unwrap(), Some(("c-1".to_string(), true)));
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_record_is_idempotent() {
        let (_dir, ledger) = test_ledger();
        ledger.record(&pending("abc#1", 1), "c-1").unwrap();
        ledger.record(&pending("abc#1", 1), "c-2").unwrap();
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_split_drops_loaded_rows() {
        let (_dir, ledger) = test_ledger();
        ledger.record(&pending("a#1", 1), "c-1").unwrap();
        let split = ledger
            .split(vec![pending("a#1", 1), pending("b#1", 2), pending("a#2", 3)])
            .unwrap();
        assert_eq!(split.already, 1);
        assert!(split.resend.is_empty());
        let fps: Vec<_> = split.fresh.iter().map(|c| c.fingerprint.as_str()).collect();
        assert_eq!(fps, vec!["b#1", "a#2"]);
    }

    #[test]
    fn test_header_without_items_loaded_is_resent() {
        let (_dir, ledger) = test_ledger();
        ledger.record(&with_items("a#1", 1, 2), "c-1").unwrap();
        assert_eq!(ledger.lookup("a#1").unwrap(), Some(("c-1".to_string(), false)));

        let split = ledger.split(vec![with_items("a#1", 1, 2)]).unwrap();
        assert_eq!(split.already, 0);
        assert!(split.fresh.is_empty());
        assert_eq!(split.resend.len(), 1);
        assert_eq!(split.resend[0].1, "c-1");

        ledger.mark_items_loaded("a#1").unwrap();
        let split = ledger.split(vec![with_items("a#1", 1, 2)]).unwrap();
        assert_eq!(split.already, 1);
        assert!(split.resend.is_empty());
    }

    #[test]
    fn test_summarize_groups_by_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haul.db");
        let first = Ledger::open(&path, "a.csv").unwrap();
        first.record(&pending("x#1", 1), "c-1").unwrap();
        first.record(&pending("y#1", 2), "c-2").unwrap();
        let second = Ledger::open(&path, "b.csv").unwrap();
        second.record(&pending("z#1", 1), "c-3").unwrap();

        let conn = get_connection(&path).unwrap();
        let mut summary = summarize(&conn).unwrap();
        summary.sort();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].0, "a.csv");
        assert_eq!(summary[0].1, 2);
        assert_eq!(summary[1].1, 1);
    }
}
