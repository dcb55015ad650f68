//! Per-date attendance records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::Category;
use crate::dates;

/// Attendance for one meeting date.
///
/// The present set and the per-category totals are only changed together,
/// through [`mark_present`](Self::mark_present), [`mark_absent`](Self::mark_absent)
/// and [`recategorize`](Self::recategorize), so the totals always equal the
/// category counts of the present set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    /// Meeting date.
    pub date: NaiveDate,
    /// Canonical date string, also the history key on members.
    pub date_string: String,
    /// Sheet column holding this date.
    pub column_index: usize,
    /// Present member ids with the category each was counted under.
    present: BTreeMap<String, Category>,
    /// Present count per category.
    category_totals: BTreeMap<Category, usize>,
}

impl AttendanceRecord {
    /// Create an empty record for a date stored in the given column.
    #[must_use]
    pub fn new(date: NaiveDate, column_index: usize) -> Self {
        Self {
            date,
            date_string: dates::canonical(date),
            column_index,
            present: BTreeMap::new(),
            category_totals: BTreeMap::new(),
        }
    }

    /// Mark a member present. Returns `false` if they already were.
    pub fn mark_present(&mut self, member_id: &str, category: Category) -> bool {
        if self.present.contains_key(member_id) {
            return false;
        }
        self.present.insert(member_id.to_string(), category);
        *self.category_totals.entry(category).or_insert(0) += 1;
        true
    }

    /// Mark a member absent. Returns `false` if they were not present.
    pub fn mark_absent(&mut self, member_id: &str) -> bool {
        let Some(category) = self.present.remove(member_id) else {
            return false;
        };
        self.decrement(category);
        true
    }

    /// Move a present member's count to a new category.
    pub fn recategorize(&mut self, member_id: &str, category: Category) {
        let Some(previous) = self.present.get_mut(member_id) else {
            return;
        };
        if *previous == category {
            return;
        }
        let old = std::mem::replace(previous, category);
        self.decrement(old);
        *self.category_totals.entry(category).or_insert(0) += 1;
    }

    fn decrement(&mut self, category: Category) {
        if let Some(count) = self.category_totals.get_mut(&category) {
            *count -= 1;
            if *count == 0 {
                self.category_totals.remove(&category);
            }
        }
    }

    /// Whether a member is in the present set.
    #[must_use]
    pub fn is_present(&self, member_id: &str) -> bool {
        self.present.contains_key(member_id)
    }

    /// Ids of present members, in id order.
    pub fn present_members(&self) -> impl Iterator<Item = &str> + '_ {
        self.present.keys().map(String::as_str)
    }

    /// Number of present members.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.present.len()
    }

    /// Present count for one category.
    #[must_use]
    pub fn category_total(&self, category: Category) -> usize {
        self.category_totals.get(&category).copied().unwrap_or(0)
    }

    /// Present counts for every category with at least one attendee.
    #[must_use]
    pub fn category_totals(&self) -> &BTreeMap<Category, usize> {
        &self.category_totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AttendanceRecord {
        AttendanceRecord::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), 3)
    }

    fn totals_match(record: &AttendanceRecord) -> bool {
        let sum: usize = record.category_totals().values().sum();
        sum == record.present_count()
    }

    #[test]
    fn test_new_record() {
        let r = record();
        assert_eq!(r.date_string, "2024-03-07");
        assert_eq!(r.column_index, 3);
        assert_eq!(r.present_count(), 0);
        assert!(r.category_totals().is_empty());
    }

    #[test]
    fn test_mark_present_updates_totals() {
        let mut r = record();
        assert!(r.mark_present("a", Category::OldMember));
        assert!(r.mark_present("b", Category::OldMember));
        assert!(r.mark_present("c", Category::Visitor));

        assert_eq!(r.category_total(Category::OldMember), 2);
        assert_eq!(r.category_total(Category::Visitor), 1);
        assert_eq!(r.category_total(Category::FirstTimer), 0);
        assert!(totals_match(&r));
    }

    #[test]
    fn test_mark_present_twice_is_noop() {
        let mut r = record();
        assert!(r.mark_present("a", Category::OldMember));
        assert!(!r.mark_present("a", Category::OldMember));
        assert_eq!(r.present_count(), 1);
        assert_eq!(r.category_total(Category::OldMember), 1);
    }

    #[test]
    fn test_mark_absent_updates_totals() {
        let mut r = record();
        r.mark_present("a", Category::OldMember);
        r.mark_present("b", Category::Visitor);

        assert!(r.mark_absent("a"));
        assert!(!r.mark_absent("a"));
        assert!(!r.is_present("a"));
        assert_eq!(r.category_total(Category::OldMember), 0);
        assert!(!r.category_totals().contains_key(&Category::OldMember));
        assert!(totals_match(&r));
    }

    #[test]
    fn test_recategorize_moves_count() {
        let mut r = record();
        r.mark_present("a", Category::FirstTimer);
        r.recategorize("a", Category::OldMember);
        r.recategorize("missing", Category::Visitor);

        assert_eq!(r.category_total(Category::FirstTimer), 0);
        assert_eq!(r.category_total(Category::OldMember), 1);
        assert!(totals_match(&r));

        r.mark_absent("a");
        assert!(r.category_totals().is_empty());
    }

    #[test]
    fn test_present_members_sorted() {
        let mut r = record();
        r.mark_present("c", Category::OldMember);
        r.mark_present("a", Category::OldMember);
        let ids: Vec<&str> = r.present_members().collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
