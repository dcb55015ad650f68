//! The local settings store.
//!
//! Only the member-statistics sort order lives here. It is read once when the
//! coordinator starts and written whenever it changes.

use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::stats::MemberSortOrder;

/// Key under which the sort order is persisted.
pub const SORT_ORDER_KEY: &str = "member_sort_order";

/// Persistence for user preferences.
pub trait SettingsStore: Send + Sync + std::fmt::Debug {
    /// Read the saved sort order, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds an unknown value.
    fn load_sort_order(&self) -> Result<Option<MemberSortOrder>>;

    /// Persist the sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save_sort_order(&self, order: MemberSortOrder) -> Result<()>;
}

/// Settings kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySettings {
    sort_order: Mutex<Option<MemberSortOrder>>,
}

impl MemorySettings {
    /// Create a store pre-populated with a sort order.
    #[must_use]
    pub fn with_sort_order(order: MemberSortOrder) -> Self {
        Self {
            sort_order: Mutex::new(Some(order)),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn load_sort_order(&self) -> Result<Option<MemberSortOrder>> {
        self.sort_order
            .lock()
            .map(|guard| *guard)
            .map_err(|_| Error::internal("settings lock poisoned"))
    }

    fn save_sort_order(&self, order: MemberSortOrder) -> Result<()> {
        let mut guard = self
            .sort_order
            .lock()
            .map_err(|_| Error::internal("settings lock poisoned"))?;
        *guard = Some(order);
        Ok(())
    }
}
