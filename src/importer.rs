use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::models::SourceRow;

// ---------------------------------------------------------------------------
// Tabular values -> SourceRow
// ---------------------------------------------------------------------------

/// Turns a header row plus data rows into keyed records. Rows whose cells are
/// all blank are dropped; short rows read their missing cells as empty.
/// Indices count data rows from 1 in their original position.
pub fn rows_from_values(values: &[Vec<String>]) -> Vec<SourceRow> {
    let Some((header, data)) = values.split_first() else {
        return Vec::new();
    };
    let header: Vec<String> = header
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    data.iter()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(i, cells)| {
            let fields: HashMap<String, String> = header
                .iter()
                .enumerate()
                .filter(|(_, name)| !name.is_empty())
                .map(|(col, name)| (name.clone(), cells.get(col).cloned().unwrap_or_default()))
                .collect();
            SourceRow::new(i + 1, fields)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

pub fn read_values<R: Read>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        values.push(record.iter().map(str::to_string).collect());
    }
    Ok(values)
}

/// Reads a UTF-8 CSV export (header row required) into source rows.
pub fn read_source_rows(path: &Path) -> Result<Vec<SourceRow>> {
    let file = std::fs::File::open(path)?;
    let values = read_values(std::io::BufReader::new(file))?;
    Ok(rows_from_values(&values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_rows_from_values_keys_by_header() {
        let rows = rows_from_values(&values(&[
            &["Fecha", " Plaza ", "Local"],
            &["01/02/2024", "Plaza Mall", "TIENDA A"],
        ]));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].get("Plaza"), "Plaza Mall");
        assert_eq!(rows[0].get("Missing"), "");
    }

    #[test]
    fn test_blank_rows_dropped_and_indices_kept() {
        let rows = rows_from_values(&values(&[
            &["A", "B"],
            &["1", "2"],
            &["", " "],
            &["3"],
        ]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index, 3);
        assert_eq!(rows[1].get("A"), "3");
        assert_eq!(rows[1].get("B"), "");
    }

    #[test]
    fn test_empty_input() {
        assert!(rows_from_values(&[]).is_empty());
        assert!(rows_from_values(&values(&[&["only", "header"]])).is_empty());
    }

    #[test]
    fn test_read_source_rows_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recolecciones.csv");
        let content = "\u{feff}Fecha,Plaza,Local_Consolidado,Organico,Pet\n\
01/02/2024,Plaza Mall,TIENDA A,\"10,0\",0\n\
02/02/2024,Plaza Mall,TIENDA B,,1.5\n";
        std::fs::write(&path, content).unwrap();
        let rows = read_source_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Fecha"), "01/02/2024");
        assert_eq!(rows[0].get("Organico"), "10,0");
        assert_eq!(rows[1].get("Pet"), "1.5");
    }
}
