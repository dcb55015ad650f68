//! The remote tabular source: the spreadsheet that is the system of record.
//!
//! The sheet is a grid of text cells. Row 0 is the header; member rows follow.
//! Columns 0..3 hold id, name and status code; every column after that is one
//! meeting date, with the date in the header cell and a presence cell per
//! member row.
//!
//! [`TabularSource`] is the seam the repository talks to. Two implementations
//! ship with the crate: [`MemorySheet`] and the SQLite-backed [`SqliteSheet`].

mod layout;
mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use layout::{parse_grid, ParsedSheet};
pub use memory::{FailureKind, MemorySheet};
pub use sqlite::{SqliteSettings, SqliteSheet};

/// Column holding the member id.
pub const ID_COLUMN: usize = 0;
/// Column holding the member name.
pub const NAME_COLUMN: usize = 1;
/// Column holding the category code.
pub const STATUS_COLUMN: usize = 2;
/// First column that can hold a meeting date.
pub const FIRST_DATE_COLUMN: usize = 3;

/// Header cells for the fixed columns.
pub const FIXED_HEADERS: [&str; FIRST_DATE_COLUMN] = ["ID", "Name", "Status"];

/// Cell text written for a present member.
pub const PRESENT_CELL: &str = "TRUE";
/// Cell text written for an absent member.
pub const ABSENT_CELL: &str = "FALSE";

/// Interpret a presence cell. Anything not recognizably truthy is absent.
#[must_use]
pub fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "x" | "yes" | "y" | "✓"
    )
}

/// Render a presence value as cell text.
#[must_use]
pub fn presence_cell(present: bool) -> &'static str {
    if present {
        PRESENT_CELL
    } else {
        ABSENT_CELL
    }
}

/// A rectangular read of the sheet: the header row followed by member rows.
///
/// Rows may be ragged; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetGrid {
    /// All rows, header first.
    pub rows: Vec<Vec<String>>,
}

impl SheetGrid {
    /// Build a grid from string-like rows.
    #[must_use]
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// An empty sheet carrying only the fixed headers.
    #[must_use]
    pub fn with_fixed_headers() -> Self {
        Self::from_rows([FIXED_HEADERS])
    }

    /// Cell text, or `""` when the cell is outside the grid.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    /// Number of member rows (excluding the header).
    #[must_use]
    pub fn member_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Width of the widest row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Write a cell, growing the grid as needed.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.into();
    }
}

/// The fixed cells of one member row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    /// Member id.
    pub id: String,
    /// Member name.
    pub name: String,
    /// Category code.
    pub status: String,
}

impl MemberRow {
    /// The fixed cells in column order.
    #[must_use]
    pub fn cells(&self) -> [&str; FIRST_DATE_COLUMN] {
        [&self.id, &self.name, &self.status]
    }
}

/// Access to the remote sheet.
///
/// Every method is one remote round trip. Implementations report transport
/// problems as [`Error::Network`](crate::Error::Network), rejected sessions as
/// [`Error::Auth`](crate::Error::Auth) and missing rows as
/// [`Error::NotFound`](crate::Error::NotFound).
#[async_trait]
pub trait TabularSource: Send + Sync + std::fmt::Debug {
    /// Read the whole sheet in one pass.
    async fn read_grid(&self) -> Result<SheetGrid>;

    /// Write a date column: the header cell plus the presence cell of every
    /// listed row, in a single call.
    async fn write_column(
        &self,
        column: usize,
        header: String,
        cells: Vec<(usize, bool)>,
    ) -> Result<()>;

    /// Append a member row and return the row it landed on.
    async fn append_row(&self, row: MemberRow) -> Result<usize>;

    /// Rewrite the fixed cells of an existing member row.
    async fn update_row(&self, row_index: usize, row: MemberRow) -> Result<()>;

    /// Delete a member row; rows below move up by one.
    async fn delete_row(&self, row_index: usize) -> Result<()>;
}
