//! `SQLite` schema definitions for the local sheet.
//!
//! The sheet is stored cell by cell so the grid can be ragged, exactly like a
//! hand-edited spreadsheet.

/// SQL statement to create the cells table.
pub const CREATE_CELLS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS cells (
    row_index INTEGER NOT NULL,
    column_index INTEGER NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (row_index, column_index)
)
";

/// SQL statement to create an index on column for date-column scans.
pub const CREATE_COLUMN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_cells_column ON cells(column_index)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_CELLS_TABLE,
    CREATE_COLUMN_INDEX,
    CREATE_METADATA_TABLE,
];
