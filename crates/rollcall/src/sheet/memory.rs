//! An in-process sheet with injectable failures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{presence_cell, MemberRow, SheetGrid, TabularSource};
use crate::error::{Error, Result};

/// Kinds of failure a [`MemorySheet`] can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Fail with [`Error::Network`].
    Network,
    /// Fail with [`Error::Auth`].
    Auth,
    /// Never answer (the caller's timeout decides).
    Hang,
}

#[derive(Debug, Default)]
struct Faults {
    queued: VecDeque<FailureKind>,
    latencies: VecDeque<Duration>,
}

/// A sheet held in memory.
///
/// Used by tests and demos. Failures and per-call latency can be queued so
/// the next calls misbehave in a controlled order.
#[derive(Debug, Default)]
pub struct MemorySheet {
    grid: Mutex<SheetGrid>,
    faults: Mutex<Faults>,
    column_writes: AtomicUsize,
}

impl MemorySheet {
    /// Create a sheet from an existing grid.
    #[must_use]
    pub fn new(grid: SheetGrid) -> Self {
        Self {
            grid: Mutex::new(grid),
            ..Self::default()
        }
    }

    /// Create a sheet with only the fixed header row.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(SheetGrid::with_fixed_headers())
    }

    /// Make the next call fail with the given kind.
    pub fn fail_next(&self, kind: FailureKind) {
        lock(&self.faults).queued.push_back(kind);
    }

    /// Delay the next call by `latency` before it runs.
    pub fn delay_next(&self, latency: Duration) {
        lock(&self.faults).latencies.push_back(latency);
    }

    /// Copy of the current grid.
    #[must_use]
    pub fn grid(&self) -> SheetGrid {
        lock(&self.grid).clone()
    }

    /// Replace the grid wholesale, as an edit made outside the app would.
    pub fn replace_grid(&self, grid: SheetGrid) {
        *lock(&self.grid) = grid;
    }

    /// Number of `write_column` calls that reached the grid.
    #[must_use]
    pub fn column_writes(&self) -> usize {
        self.column_writes.load(Ordering::SeqCst)
    }

    /// Apply queued latency and failures for one call.
    async fn gate(&self, operation: &'static str) -> Result<()> {
        let (latency, failure) = {
            let mut faults = lock(&self.faults);
            (faults.latencies.pop_front(), faults.queued.pop_front())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            None => Ok(()),
            Some(FailureKind::Network) => Err(Error::network(operation, "simulated outage")),
            Some(FailureKind::Auth) => Err(Error::auth("simulated expired session")),
            Some(FailureKind::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock cannot leave the grid half-written in a
    // way later calls care about, so recover the guard.
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl TabularSource for MemorySheet {
    async fn read_grid(&self) -> Result<SheetGrid> {
        // The response reflects the grid when the request was made, even if
        // it arrives late.
        let grid = self.grid();
        self.gate("read_grid").await?;
        Ok(grid)
    }

    async fn write_column(
        &self,
        column: usize,
        header: String,
        cells: Vec<(usize, bool)>,
    ) -> Result<()> {
        self.gate("write_column").await?;
        let mut grid = lock(&self.grid);
        grid.set_cell(0, column, header);
        for (row, present) in cells {
            grid.set_cell(row, column, presence_cell(present));
        }
        self.column_writes.fetch_add(1, Ordering::SeqCst);
        debug!(column, "memory sheet column written");
        Ok(())
    }

    async fn append_row(&self, row: MemberRow) -> Result<usize> {
        self.gate("append_row").await?;
        let mut grid = lock(&self.grid);
        let index = grid.rows.len().max(1);
        for (column, value) in row.cells().into_iter().enumerate() {
            grid.set_cell(index, column, value);
        }
        Ok(index)
    }

    async fn update_row(&self, row_index: usize, row: MemberRow) -> Result<()> {
        self.gate("update_row").await?;
        let mut grid = lock(&self.grid);
        if row_index == 0 || row_index >= grid.rows.len() {
            return Err(Error::not_found("row", row_index.to_string()));
        }
        for (column, value) in row.cells().into_iter().enumerate() {
            grid.set_cell(row_index, column, value);
        }
        Ok(())
    }

    async fn delete_row(&self, row_index: usize) -> Result<()> {
        self.gate("delete_row").await?;
        let mut grid = lock(&self.grid);
        if row_index == 0 || row_index >= grid.rows.len() {
            return Err(Error::not_found("row", row_index.to_string()));
        }
        grid.rows.remove(row_index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str, status: &str) -> MemberRow {
        MemberRow {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let sheet = MemorySheet::empty();
        let first = sheet.append_row(row("a", "Alice", "OM")).await.unwrap();
        let second = sheet.append_row(row("b", "Bob", "XT")).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        let grid = sheet.read_grid().await.unwrap();
        assert_eq!(grid.cell(2, 1), "Bob");
    }

    #[tokio::test]
    async fn test_write_column_single_call() {
        let sheet = MemorySheet::empty();
        sheet.append_row(row("a", "Alice", "OM")).await.unwrap();
        sheet.append_row(row("b", "Bob", "XT")).await.unwrap();

        sheet
            .write_column(3, "2024-03-07".to_string(), vec![(1, true), (2, false)])
            .await
            .unwrap();

        let grid = sheet.grid();
        assert_eq!(grid.cell(0, 3), "2024-03-07");
        assert_eq!(grid.cell(1, 3), "TRUE");
        assert_eq!(grid.cell(2, 3), "FALSE");
        assert_eq!(sheet.column_writes(), 1);
    }

    #[tokio::test]
    async fn test_delete_row_shifts_up() {
        let sheet = MemorySheet::empty();
        for id in ["a", "b", "c"] {
            sheet.append_row(row(id, id, "OM")).await.unwrap();
        }
        sheet.delete_row(2).await.unwrap();

        let grid = sheet.grid();
        assert_eq!(grid.member_row_count(), 2);
        assert_eq!(grid.cell(2, 0), "c");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_row() {
        let sheet = MemorySheet::empty();
        assert!(sheet
            .update_row(4, row("x", "X", "OM"))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(sheet.delete_row(0).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_queued_failures_apply_in_order() {
        let sheet = MemorySheet::empty();
        sheet.fail_next(FailureKind::Network);
        sheet.fail_next(FailureKind::Auth);

        assert!(sheet.read_grid().await.unwrap_err().is_retryable());
        assert!(sheet.read_grid().await.unwrap_err().requires_reauth());
        assert!(sheet.read_grid().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_grid_untouched() {
        let sheet = MemorySheet::empty();
        sheet.fail_next(FailureKind::Network);
        let result = sheet
            .write_column(3, "2024-03-07".to_string(), vec![(1, true)])
            .await;
        assert!(result.is_err());
        assert_eq!(sheet.grid(), SheetGrid::with_fixed_headers());
        assert_eq!(sheet.column_writes(), 0);
    }
}
