//! Sort orders for the member statistics list.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::MemberStatistics;
use crate::error::Error;

/// How the member statistics list is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSortOrder {
    /// Alphabetical by name.
    Name,
    /// Highest attendance percentage first.
    #[default]
    AttendanceDesc,
    /// Lowest attendance percentage first.
    AttendanceAsc,
    /// Longest current streak first.
    CurrentStreak,
    /// Longest ever streak first.
    LongestStreak,
    /// Grouped by category in display order.
    Category,
}

impl MemberSortOrder {
    /// Every sort order.
    pub const ALL: [Self; 6] = [
        Self::Name,
        Self::AttendanceDesc,
        Self::AttendanceAsc,
        Self::CurrentStreak,
        Self::LongestStreak,
        Self::Category,
    ];

    /// Stable string form, used for persistence and the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::AttendanceDesc => "attendance_desc",
            Self::AttendanceAsc => "attendance_asc",
            Self::CurrentStreak => "current_streak",
            Self::LongestStreak => "longest_streak",
            Self::Category => "category",
        }
    }

    fn compare(self, a: &MemberStatistics, b: &MemberStatistics) -> Ordering {
        match self {
            Self::Name => Ordering::Equal,
            Self::AttendanceDesc => b
                .attendance_percentage
                .total_cmp(&a.attendance_percentage),
            Self::AttendanceAsc => a
                .attendance_percentage
                .total_cmp(&b.attendance_percentage),
            Self::CurrentStreak => b.current_streak.cmp(&a.current_streak),
            Self::LongestStreak => b.longest_streak.cmp(&a.longest_streak),
            Self::Category => a.category.cmp(&b.category),
        }
    }
}

impl fmt::Display for MemberSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberSortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|order| order.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|o| o.as_str()).collect();
                Error::invalid_input(format!(
                    "unknown sort order '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Sort member statistics in place. Ties break by name, then id.
pub fn sort_member_statistics(stats: &mut [MemberStatistics], order: MemberSortOrder) {
    stats.sort_by(|a, b| {
        order
            .compare(a, b)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
}
