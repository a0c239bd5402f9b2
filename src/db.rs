use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS migrated_rows (
    fingerprint TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL,
    source_file TEXT,
    row_index INTEGER,
    items_loaded INTEGER NOT NULL DEFAULT 0,
    migrated_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_migrated_rows_source ON migrated_rows(source_file);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
