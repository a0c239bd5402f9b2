use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HaulError, Result};
use crate::importer::{read_values, rows_from_values};
use crate::models::SourceRow;
use crate::settings::Settings;

/// Upper bound on cell updates per bulk-update call.
pub const MAX_UPDATES_PER_CALL: usize = 1000;

const SHEETS_API: &str = "https://sheets.googleapis.com/";

/// One cell write. Row and column are 1-based sheet coordinates, so the
/// header row is row 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub column: usize,
    pub value: String,
}

impl CellUpdate {
    /// A1 reference, e.g. column 3 row 7 -> `C7`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_letters(self.column), self.row)
    }
}

pub fn column_letters(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Bulk access to a spreadsheet: read a whole sheet, write cells in bulk.
pub trait SheetSource {
    /// Header row followed by data rows, as displayed text.
    fn read_values(&self, sheet: &str) -> Result<Vec<Vec<String>>>;

    /// Writes at most [`MAX_UPDATES_PER_CALL`] cells.
    fn batch_update(&self, sheet: &str, updates: &[CellUpdate]) -> Result<()>;

    fn describe(&self) -> String;
}

/// Whole sheet as keyed rows.
pub fn read_rows(source: &dyn SheetSource, sheet: &str) -> Result<Vec<SourceRow>> {
    let values = source.read_values(sheet)?;
    info!(sheet, rows = values.len().saturating_sub(1), source = %source.describe(), "sheet read");
    Ok(rows_from_values(&values))
}

/// Submits `updates` in chunks the backend accepts. Stops at the first
/// failed chunk; earlier chunks stay written.
pub fn update_in_chunks(source: &dyn SheetSource, sheet: &str, updates: &[CellUpdate]) -> Result<usize> {
    let mut written = 0usize;
    for chunk in updates.chunks(MAX_UPDATES_PER_CALL) {
        source.batch_update(sheet, chunk)?;
        written += chunk.len();
        info!(sheet, written, total = updates.len(), "cells updated");
    }
    Ok(written)
}

/// Picks the sheet backend from settings: a local workbook when `sheet_dir`
/// is set, otherwise the remote spreadsheet.
pub fn open_sheet_source(settings: &Settings) -> Result<Box<dyn SheetSource>> {
    if let Some(dir) = settings.sheet_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        let path = PathBuf::from(crate::settings::shellexpand_path(dir));
        #[cfg(feature = "xlsx")]
        if path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("xlsx"))
        {
            return Ok(Box::new(XlsxWorkbook::new(path)));
        }
        return Ok(Box::new(CsvWorkbook::new(path)));
    }

    let sheet_id = settings
        .sheet_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| HaulError::Config("neither sheet_dir nor sheet_id is set (HAUL_SHEET_ID)".into()))?;
    let token = settings.sheets_token()?;
    Ok(Box::new(GoogleSheets::new(sheet_id, &token, settings.http_timeout_secs)?))
}

// ---------------------------------------------------------------------------
// Google Sheets v4
// ---------------------------------------------------------------------------

pub struct GoogleSheets {
    client: HttpClient,
    sheet_id: String,
    headers: HeaderMap,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    value_input_option: &'a str,
    data: Vec<RangeValues>,
}

#[derive(Serialize)]
struct RangeValues {
    range: String,
    values: [[String; 1]; 1],
}

/// Sheet names go in single quotes inside A1 ranges; quotes double up.
fn quoted_sheet(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

impl GoogleSheets {
    pub fn new(sheet_id: &str, token: &str, timeout_secs: Option<u64>) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout_secs.map(Duration::from_secs))
            .build()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HaulError::Config("spreadsheet token has invalid characters".into()))?,
        );
        Ok(Self {
            client,
            sheet_id: sheet_id.to_string(),
            headers,
        })
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API).map_err(|e| HaulError::Other(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| HaulError::Other("sheets API base cannot take a path".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.sheet_id.as_str()])
            .extend(tail);
        Ok(url)
    }
}

impl SheetSource for GoogleSheets {
    fn read_values(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        let range = quoted_sheet(sheet);
        let response = self
            .client
            .get(self.url(&["values", &range])?)
            .headers(self.headers.clone())
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(HaulError::Remote {
                status: status.as_u16(),
                body: response.text().unwrap_or_default().chars().take(200).collect(),
            });
        }
        let body: ValueRange = response.json()?;
        Ok(body.values)
    }

    fn batch_update(&self, sheet: &str, updates: &[CellUpdate]) -> Result<()> {
        let prefix = quoted_sheet(sheet);
        let request = BatchUpdateRequest {
            value_input_option: "RAW",
            data: updates
                .iter()
                .map(|u| RangeValues {
                    range: format!("{prefix}!{}", u.a1()),
                    values: [[u.value.clone()]],
                })
                .collect(),
        };
        let response = self
            .client
            .post(self.url(&["values:batchUpdate"])?)
            .headers(self.headers.clone())
            .json(&request)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(HaulError::Remote {
                status: status.as_u16(),
                body: response.text().unwrap_or_default().chars().take(200).collect(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("spreadsheet {}", self.sheet_id)
    }
}

// ---------------------------------------------------------------------------
// Local CSV workbook: one `<sheet>.csv` per sheet
// ---------------------------------------------------------------------------

pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{sheet}.csv"))
    }
}

fn open_sheet_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path)
        .map_err(|e| HaulError::Sheet(format!("{}: {e}", path.display())))
}

impl SheetSource for CsvWorkbook {
    fn read_values(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        let file = open_sheet_file(&self.sheet_path(sheet))?;
        read_values(std::io::BufReader::new(file))
    }

    fn batch_update(&self, sheet: &str, updates: &[CellUpdate]) -> Result<()> {
        let mut values = self.read_values(sheet)?;
        for update in updates {
            if update.row == 0 || update.column == 0 {
                return Err(HaulError::Sheet(format!("invalid cell {}:{}", update.row, update.column)));
            }
            if values.len() < update.row {
                values.resize(update.row, Vec::new());
            }
            let row = &mut values[update.row - 1];
            if row.len() < update.column {
                row.resize(update.column, String::new());
            }
            row[update.column - 1] = update.value.clone();
        }

        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(self.sheet_path(sheet))?;
        for row in &values {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("CSV workbook {}", self.dir.display())
    }
}

// ---------------------------------------------------------------------------
// Local XLSX workbook (read-only)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
pub struct XlsxWorkbook {
    path: PathBuf,
}

#[cfg(feature = "xlsx")]
impl XlsxWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(feature = "xlsx")]
impl SheetSource for XlsxWorkbook {
    fn read_values(&self, sheet: &str) -> Result<Vec<Vec<String>>> {
        use calamine::{Data, Reader};

        let mut workbook = calamine::open_workbook_auto(&self.path)
            .map_err(|e| HaulError::Sheet(format!("{}: {e}", self.path.display())))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| HaulError::Sheet(format!("{sheet}: {e}")))?;
        Ok(range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty => String::new(),
                        Data::String(s) => s.clone(),
                        Data::Int(i) => i.to_string(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    fn batch_update(&self, _sheet: &str, _updates: &[CellUpdate]) -> Result<()> {
        Err(HaulError::Sheet(format!(
            "{} is read-only; export the sheet to CSV to normalize it",
            self.path.display()
        )))
    }

    fn describe(&self) -> String {
        format!("XLSX workbook {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CountingSource {
        calls: RefCell<Vec<usize>>,
    }

    impl SheetSource for CountingSource {
        fn read_values(&self, _sheet: &str) -> Result<Vec<Vec<String>>> {
            Ok(Vec::new())
        }

        fn batch_update(&self, _sheet: &str, updates: &[CellUpdate]) -> Result<()> {
            self.calls.borrow_mut().push(updates.len());
            Ok(())
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(3), "C");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_a1_reference() {
        let u = CellUpdate { row: 7, column: 3, value: "x".into() };
        assert_eq!(u.a1(), "C7");
    }

    #[test]
    fn test_quoted_sheet_escapes_quotes() {
        assert_eq!(quoted_sheet("CAT_LOCALES"), "'CAT_LOCALES'");
        assert_eq!(quoted_sheet("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_updates_are_chunked() {
        let source = CountingSource { calls: RefCell::new(Vec::new()) };
        let updates: Vec<_> = (0..2500)
            .map(|i| CellUpdate { row: i + 2, column: 3, value: "v".into() })
            .collect();
        let written = update_in_chunks(&source, "OPERATIVO", &updates).unwrap();
        assert_eq!(written, 2500);
        assert_eq!(*source.calls.borrow(), vec![1000, 1000, 500]);
    }

    #[test]
    fn test_csv_workbook_read_and_update() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("OPERATIVO.csv"),
            "Fecha,Local,Plaza\n01/02/2024,TIENDA A,PLAZA MALL\n02/02/2024,TIENDA B,Plaza Mall\n",
        )
        .unwrap();
        let book = CsvWorkbook::new(dir.path());
        book.batch_update("OPERATIVO", &[CellUpdate { row: 2, column: 3, value: "Plaza Mall".into() }])
            .unwrap();
        let values = book.read_values("OPERATIVO").unwrap();
        assert_eq!(values[1], vec!["01/02/2024", "TIENDA A", "Plaza Mall"]);
        assert_eq!(values[2][2], "Plaza Mall");
    }

    #[test]
    fn test_read_rows_keys_by_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("CAT_LOCALES.csv"),
            "Plaza_Nombre,Nombre_Local\nPlaza Mall,ZARA\n,\n",
        )
        .unwrap();
        let book = CsvWorkbook::new(dir.path());
        let rows = read_rows(&book, "CAT_LOCALES").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Nombre_Local"), "ZARA");
    }

    #[test]
    fn test_csv_workbook_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let book = CsvWorkbook::new(dir.path());
        assert!(matches!(book.read_values("NOPE"), Err(HaulError::Sheet(_))));
    }

    #[test]
    fn test_open_sheet_source_needs_configuration() {
        let settings = Settings::default();
        assert!(matches!(open_sheet_source(&settings), Err(HaulError::Config(_))));
    }

    #[test]
    fn test_open_sheet_source_prefers_local_dir() {
        let settings = Settings {
            sheet_dir: Some("/tmp/sheets".into()),
            ..Settings::default()
        };
        let source = open_sheet_source(&settings).unwrap();
        assert!(source.describe().contains("CSV workbook"));
    }
}
