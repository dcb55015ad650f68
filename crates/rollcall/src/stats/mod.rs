//! Attendance statistics.
//!
//! Everything here is computed from a member list and a record list with no
//! I/O. [`engine`] holds the pure functions, [`StatisticsService`] runs them
//! in the background and publishes the latest [`StatisticsReport`].

pub mod engine;
mod service;
mod sort;

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AttendanceRecord, Category};

pub use engine::{
    all_member_statistics, category_statistics, compute_report, member_statistics,
    overall_statistics, trend_analysis,
};
pub use service::StatisticsService;
pub use sort::{sort_member_statistics, MemberSortOrder};

/// Default number of meetings in a trend window.
pub const DEFAULT_TREND_WINDOW: usize = 10;

/// Default half-width of the "stable" band, in percentage points.
pub const DEFAULT_STABLE_TOLERANCE: f64 = 5.0;

/// Aggregate numbers across all meetings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStatistics {
    /// Members in the directory.
    pub total_members: usize,
    /// Meetings counted, including ones nobody attended.
    pub total_meetings: usize,
    /// Mean number of members present per meeting.
    pub average_attendance: f64,
    /// Mean share of the directory present per meeting.
    pub average_attendance_percentage: f64,
    /// Largest single-meeting attendance.
    pub highest_attendance: usize,
    /// Smallest single-meeting attendance.
    pub lowest_attendance: usize,
    /// Date of the latest meeting, if any.
    pub most_recent_meeting: Option<NaiveDate>,
}

/// One member's attendance numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberStatistics {
    /// Member id.
    pub member_id: String,
    /// Display name.
    pub name: String,
    /// Membership category.
    pub category: Category,
    /// Meetings the member was present at.
    pub meetings_attended: usize,
    /// Meetings counted.
    pub total_meetings: usize,
    /// Share of meetings attended, 0 to 100.
    pub attendance_percentage: f64,
    /// Consecutive meetings attended, counting back from the latest.
    pub current_streak: usize,
    /// Longest run of consecutive meetings attended.
    pub longest_streak: usize,
    /// Latest meeting the member was present at.
    pub last_attended: Option<NaiveDate>,
}

/// Attendance numbers for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    /// Membership category.
    pub category: Category,
    /// Members in the category.
    pub member_count: usize,
    /// Mean of the members' attendance percentages.
    pub average_attendance_percentage: f64,
    /// Sum of meetings attended across the category's members.
    pub total_attended: usize,
    /// `member_count * total_meetings`.
    pub total_possible: usize,
}

/// One point of a trend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceTrend {
    /// Meeting date.
    pub date: NaiveDate,
    /// Members present.
    pub attendance_count: usize,
    /// Share of the current directory present that day.
    pub attendance_percentage: f64,
}

/// Direction of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Attendance went up beyond the tolerance.
    Improving,
    /// Attendance stayed within the tolerance.
    Stable,
    /// Attendance went down beyond the tolerance.
    Declining,
}

impl TrendDirection {
    /// Lowercase label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

/// The recent-meetings trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    /// Points in ascending date order.
    pub points: Vec<AttendanceTrend>,
    /// Overall direction.
    pub direction: TrendDirection,
    /// Last point's percentage minus the first's, in percentage points.
    pub change: f64,
}

/// Policy knobs for the statistics engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsPolicy {
    /// How many recent meetings the trend covers.
    pub trend_window: usize,
    /// Changes within this many percentage points are reported as stable.
    pub stable_tolerance: f64,
    /// Dates flagged as "no meeting"; their records are ignored.
    pub skipped_dates: BTreeSet<NaiveDate>,
}

impl Default for StatisticsPolicy {
    fn default() -> Self {
        Self {
            trend_window: DEFAULT_TREND_WINDOW,
            stable_tolerance: DEFAULT_STABLE_TOLERANCE,
            skipped_dates: BTreeSet::new(),
        }
    }
}

impl StatisticsPolicy {
    /// The records that count as meetings under this policy.
    #[must_use]
    pub fn applicable<'a>(&self, records: &'a [AttendanceRecord]) -> Cow<'a, [AttendanceRecord]> {
        if self.skipped_dates.is_empty()
            || !records.iter().any(|r| self.skipped_dates.contains(&r.date))
        {
            return Cow::Borrowed(records);
        }
        Cow::Owned(
            records
                .iter()
                .filter(|r| !self.skipped_dates.contains(&r.date))
                .cloned()
                .collect(),
        )
    }
}

/// Everything the statistics screen shows, computed together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    /// Aggregate numbers.
    pub overall: OverallStatistics,
    /// Members ordered by [`StatisticsReport::sort_order`].
    pub members: Vec<MemberStatistics>,
    /// One entry per category, in display order.
    pub categories: Vec<CategoryStatistics>,
    /// Recent trend.
    pub trend: TrendAnalysis,
    /// Order of [`StatisticsReport::members`].
    pub sort_order: MemberSortOrder,
}

impl StatisticsReport {
    /// Reorder the member list.
    pub fn resort(&mut self, order: MemberSortOrder) {
        sort_member_statistics(&mut self.members, order);
        self.sort_order = order;
    }
}
