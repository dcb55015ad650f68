//! A sheet stored in a local `SQLite` file.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{MemberRow, SheetGrid, TabularSource};
use crate::error::{Error, Result};
use crate::settings::{SettingsStore, SORT_ORDER_KEY};
use crate::stats::MemberSortOrder;
use crate::storage::Storage;

/// [`TabularSource`] over a local [`Storage`] database.
///
/// Each call runs on the blocking pool; the connection is shared behind a
/// mutex, so calls are serialized.
#[derive(Debug, Clone)]
pub struct SqliteSheet {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteSheet {
    /// Open (or create) the sheet database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_storage(Storage::open(path)?))
    }

    /// An in-memory sheet, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_storage(Storage::open_in_memory()?))
    }

    fn from_storage(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// A settings store sharing this sheet's database.
    #[must_use]
    pub fn settings(&self) -> SqliteSettings {
        SqliteSettings {
            storage: Arc::clone(&self.storage),
        }
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| Error::internal("sheet storage lock poisoned"))?;
            f(&*guard)
        })
        .await
        .map_err(|e| Error::internal(format!("{operation} task failed: {e}")))?
    }
}

#[async_trait]
impl TabularSource for SqliteSheet {
    async fn read_grid(&self) -> Result<SheetGrid> {
        self.run("read_grid", Storage::read_grid).await
    }

    async fn write_column(
        &self,
        column: usize,
        header: String,
        cells: Vec<(usize, bool)>,
    ) -> Result<()> {
        self.run("write_column", move |storage| {
            storage.write_column(column, &header, &cells)
        })
        .await
    }

    async fn append_row(&self, row: MemberRow) -> Result<usize> {
        self.run("append_row", move |storage| storage.append_row(&row))
            .await
    }

    async fn update_row(&self, row_index: usize, row: MemberRow) -> Result<()> {
        self.run("update_row", move |storage| storage.update_row(row_index, &row))
            .await
    }

    async fn delete_row(&self, row_index: usize) -> Result<()> {
        self.run("delete_row", move |storage| storage.delete_row(row_index))
            .await
    }
}

/// [`SettingsStore`] kept in the sheet database's metadata table.
#[derive(Debug, Clone)]
pub struct SqliteSettings {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteSettings {
    fn with_storage<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let guard = self
            .storage
            .lock()
            .map_err(|_| Error::internal("settings storage lock poisoned"))?;
        f(&*guard)
    }
}

impl SettingsStore for SqliteSettings {
    fn load_sort_order(&self) -> Result<Option<MemberSortOrder>> {
        let raw = self.with_storage(|storage| storage.get_setting(SORT_ORDER_KEY))?;
        raw.map(|value| value.parse()).transpose()
    }

    fn save_sort_order(&self, order: MemberSortOrder) -> Result<()> {
        self.with_storage(|storage| storage.set_setting(SORT_ORDER_KEY, order.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::parse_grid;

    fn row(id: &str, name: &str, status: &str) -> MemberRow {
        MemberRow {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sheet_round_trip_through_parser() {
        let sheet = SqliteSheet::open_in_memory().unwrap();
        sheet.append_row(row("a", "Alice", "OM")).await.unwrap();
        sheet.append_row(row("b", "Bob", "XT")).await.unwrap();
        sheet
            .write_column(3, "2024-03-07".to_string(), vec![(1, true), (2, false)])
            .await
            .unwrap();

        let parsed = parse_grid(&sheet.read_grid().await.unwrap());
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.members.len(), 2);
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.records[0].is_present("a"));
        assert!(!parsed.records[0].is_present("b"));
    }

    #[tokio::test]
    async fn test_delete_row_through_trait() {
        let sheet = SqliteSheet::open_in_memory().unwrap();
        for id in ["a", "b", "c"] {
            sheet.append_row(row(id, id, "FT")).await.unwrap();
        }
        sheet.delete_row(1).await.unwrap();

        let grid = sheet.read_grid().await.unwrap();
        assert_eq!(grid.cell(1, 0), "b");
        assert_eq!(grid.member_row_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let sheet = SqliteSheet::open_in_memory().unwrap();
        let err = sheet.delete_row(7).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_settings_share_database() {
        let sheet = SqliteSheet::open_in_memory().unwrap();
        let settings = sheet.settings();

        assert_eq!(settings.load_sort_order().unwrap(), None);
        settings
            .save_sort_order(MemberSortOrder::LongestStreak)
            .unwrap();
        assert_eq!(
            sheet.settings().load_sort_order().unwrap(),
            Some(MemberSortOrder::LongestStreak)
        );
    }

    #[test]
    fn test_corrupt_setting_is_an_error() {
        let sheet = SqliteSheet::open_in_memory().unwrap();
        let settings = sheet.settings();
        settings
            .with_storage(|storage| storage.set_setting(SORT_ORDER_KEY, "sideways"))
            .unwrap();
        assert!(settings.load_sort_order().is_err());
    }
}
