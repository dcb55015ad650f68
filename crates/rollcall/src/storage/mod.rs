//! `SQLite` storage for the local sheet and app settings.
//!
//! [`Storage`] keeps a spreadsheet-shaped grid of cells plus a small key/value
//! table. It is synchronous; [`SqliteSheet`](crate::sheet::SqliteSheet) moves
//! calls onto the blocking pool.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::sheet::{presence_cell, MemberRow, SheetGrid};

/// Local database holding one sheet.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

fn sql_index(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening sheet database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Sheet database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every cell into a grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn read_grid(&self) -> Result<SheetGrid> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT row_index, column_index, value FROM cells
            ORDER BY row_index, column_index
            ",
        )?;

        let cells = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut grid = SheetGrid::default();
        for (row, column, value) in cells {
            match (usize::try_from(row), usize::try_from(column)) {
                (Ok(row), Ok(column)) => grid.set_cell(row, column, value),
                _ => warn!(row, column, "Ignoring cell with negative position"),
            }
        }
        Ok(grid)
    }

    /// Write a header cell and a set of presence cells in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written then.
    pub fn write_column(&self, column: usize, header: &str, cells: &[(usize, bool)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut upsert = tx.prepare(
                r"
                INSERT INTO cells (row_index, column_index, value) VALUES (?1, ?2, ?3)
                ON CONFLICT (row_index, column_index)
                DO UPDATE SET value = excluded.value, updated_at = datetime('now')
                ",
            )?;
            upsert.execute(params![0_i64, sql_index(column), header])?;
            for (row, present) in cells {
                upsert.execute(params![
                    sql_index(*row),
                    sql_index(column),
                    presence_cell(*present)
                ])?;
            }
        }
        tx.commit()?;
        debug!(column, cells = cells.len(), "Wrote date column");
        Ok(())
    }

    /// Append a member row after the last occupied row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn append_row(&self, row: &MemberRow) -> Result<usize> {
        let last: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(row_index), 0) FROM cells",
            [],
            |r| r.get(0),
        )?;
        let index = usize::try_from(last + 1)
            .map_err(|_| Error::internal(format!("invalid last row index {last}")))?;
        self.write_fixed_cells(index, row)?;
        debug!(row = index, id = %row.id, "Appended member row");
        Ok(index)
    }

    /// Rewrite the fixed cells of an existing member row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the row is empty or the header row.
    pub fn update_row(&self, row_index: usize, row: &MemberRow) -> Result<()> {
        if row_index == 0 || !self.row_exists(row_index)? {
            return Err(Error::not_found("row", row_index.to_string()));
        }
        self.write_fixed_cells(row_index, row)
    }

    /// Delete a member row and move every row below it up by one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the row is empty or the header row.
    pub fn delete_row(&self, row_index: usize) -> Result<()> {
        if row_index == 0 || !self.row_exists(row_index)? {
            return Err(Error::not_found("row", row_index.to_string()));
        }
        let target = sql_index(row_index);
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM cells WHERE row_index = ?1", [target])?;
        // Shift through negative indices so the primary key never collides mid-update.
        tx.execute(
            "UPDATE cells SET row_index = -(row_index - 1) WHERE row_index > ?1",
            [target],
        )?;
        tx.execute(
            "UPDATE cells SET row_index = -row_index WHERE row_index < 0",
            [],
        )?;
        tx.commit()?;
        debug!(row = row_index, "Deleted member row");
        Ok(())
    }

    /// Read a value from the metadata table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a value to the metadata table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (key, value),
        )?;
        Ok(())
    }

    fn row_exists(&self, row_index: usize) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cells WHERE row_index = ?1",
            [sql_index(row_index)],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    fn write_fixed_cells(&self, row_index: usize, row: &MemberRow) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (column, value) in row.cells().into_iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO cells (row_index, column_index, value) VALUES (?1, ?2, ?3)",
                params![sql_index(row_index), sql_index(column), value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
