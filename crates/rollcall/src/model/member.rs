//! Members of the roster.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Category;

/// A person on the roster.
///
/// Values are never edited in place once published; every change goes through
/// one of the `with_*` methods, which return a new `Member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Stable identifier, stored in the sheet's id column.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Membership category.
    pub category: Category,
    /// 1-based sheet row (the header is row 0). This is the write address.
    pub row_index: usize,
    /// Presence per canonical date string. Missing dates mean absent.
    #[serde(default)]
    pub attendance_history: BTreeMap<String, bool>,
}

impl Member {
    /// Create a member with an empty history.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        row_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            row_index,
            attendance_history: BTreeMap::new(),
        }
    }

    /// Copy of this member with presence recorded for one date.
    #[must_use]
    pub fn with_attendance(&self, date_string: &str, present: bool) -> Self {
        let mut next = self.clone();
        next.attendance_history
            .insert(date_string.to_string(), present);
        next
    }

    /// Copy of this member with a new name and category; history is kept.
    #[must_use]
    pub fn with_details(&self, name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
            ..self.clone()
        }
    }

    /// Copy of this member moved to another sheet row.
    #[must_use]
    pub fn with_row_index(&self, row_index: usize) -> Self {
        Self {
            row_index,
            ..self.clone()
        }
    }

    /// Whether the member was present on the given date.
    #[must_use]
    pub fn was_present(&self, date_string: &str) -> bool {
        self.attendance_history
            .get(date_string)
            .copied()
            .unwrap_or(false)
    }

    /// Number of `true` entries in the history.
    #[must_use]
    pub fn attended_count(&self) -> usize {
        self.attendance_history.values().filter(|p| **p).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_attendance_leaves_original_untouched() {
        let alice = Member::new("a", "Alice", Category::OldMember, 1);
        let updated = alice.with_attendance("2024-03-07", true);

        assert!(alice.attendance_history.is_empty());
        assert!(updated.was_present("2024-03-07"));
        assert_eq!(updated.id, alice.id);
    }

    #[test]
    fn test_with_attendance_overwrites_key() {
        let alice = Member::new("a", "Alice", Category::OldMember, 1)
            .with_attendance("2024-03-07", true)
            .with_attendance("2024-03-07", false);

        assert_eq!(alice.attendance_history.len(), 1);
        assert!(!alice.was_present("2024-03-07"));
    }

    #[test]
    fn test_missing_date_is_absent() {
        let alice = Member::new("a", "Alice", Category::OldMember, 1);
        assert!(!alice.was_present("2024-03-07"));
    }

    #[test]
    fn test_with_details_keeps_history() {
        let alice = Member::new("a", "Alice", Category::OldMember, 1)
            .with_attendance("2024-03-07", true);
        let renamed = alice.with_details("Alicia", Category::ExtendedTeam);

        assert_eq!(renamed.name, "Alicia");
        assert_eq!(renamed.category, Category::ExtendedTeam);
        assert!(renamed.was_present("2024-03-07"));
        assert_eq!(renamed.row_index, 1);
    }

    #[test]
    fn test_attended_count() {
        let bob = Member::new("b", "Bob", Category::Visitor, 2)
            .with_attendance("2024-03-07", true)
            .with_attendance("2024-03-14", false)
            .with_attendance("2024-03-21", true);
        assert_eq!(bob.attended_count(), 2);
    }
}
