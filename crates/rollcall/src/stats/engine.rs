//! Pure statistics functions over members and attendance records.
//!
//! None of these functions assume the records are sorted; they order them by
//! date where order matters. Records are meetings: a record with nobody
//! present still counts. Use [`StatisticsPolicy::applicable`] (or
//! [`compute_report`], which does it for you) to drop skipped dates first.

use chrono::NaiveDate;

use super::{
    sort_member_statistics, AttendanceTrend, CategoryStatistics, MemberSortOrder,
    MemberStatistics, OverallStatistics, StatisticsPolicy, StatisticsReport, TrendAnalysis,
    TrendDirection,
};
use crate::model::{AttendanceRecord, Category, Member};

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn chronological(records: &[AttendanceRecord]) -> Vec<&AttendanceRecord> {
    let mut sorted: Vec<&AttendanceRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.date);
    sorted
}

/// Aggregate numbers across every meeting.
#[must_use]
pub fn overall_statistics(members: &[Member], records: &[AttendanceRecord]) -> OverallStatistics {
    let counts: Vec<usize> = records.iter().map(AttendanceRecord::present_count).collect();
    let total_present: usize = counts.iter().sum();
    let percentage_sum: f64 = counts
        .iter()
        .map(|count| percentage(*count, members.len()))
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let average_attendance = mean(total_present as f64, records.len());

    OverallStatistics {
        total_members: members.len(),
        total_meetings: records.len(),
        average_attendance,
        average_attendance_percentage: mean(percentage_sum, records.len()),
        highest_attendance: counts.iter().copied().max().unwrap_or(0),
        lowest_attendance: counts.iter().copied().min().unwrap_or(0),
        most_recent_meeting: records.iter().map(|r| r.date).max(),
    }
}

/// Numbers for a single member.
///
/// Every record counts toward the total; a member with no entry for a date
/// was absent.
#[must_use]
pub fn member_statistics(member: &Member, records: &[AttendanceRecord]) -> MemberStatistics {
    let ordered = chronological(records);
    let present = |record: &&AttendanceRecord| record.is_present(&member.id);

    let meetings_attended = ordered.iter().copied().filter(present).count();
    let current_streak = ordered.iter().rev().copied().take_while(present).count();

    let mut longest_streak = 0;
    let mut run = 0;
    for record in ordered.iter().copied() {
        if present(&record) {
            run += 1;
            longest_streak = longest_streak.max(run);
        } else {
            run = 0;
        }
    }

    let last_attended: Option<NaiveDate> = ordered
        .iter()
        .rev()
        .copied()
        .find(present)
        .map(|record| record.date);

    MemberStatistics {
        member_id: member.id.clone(),
        name: member.name.clone(),
        category: member.category,
        meetings_attended,
        total_meetings: records.len(),
        attendance_percentage: percentage(meetings_attended, records.len()),
        current_streak,
        longest_streak,
        last_attended,
    }
}

/// Numbers for every member, in the requested order.
#[must_use]
pub fn all_member_statistics(
    members: &[Member],
    records: &[AttendanceRecord],
    order: MemberSortOrder,
) -> Vec<MemberStatistics> {
    let mut stats: Vec<MemberStatistics> = members
        .iter()
        .map(|member| member_statistics(member, records))
        .collect();
    sort_member_statistics(&mut stats, order);
    stats
}

/// One entry per category, in [`Category::ALL`] order, including empty ones.
#[must_use]
pub fn category_statistics(
    members: &[Member],
    records: &[AttendanceRecord],
) -> Vec<CategoryStatistics> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let stats: Vec<MemberStatistics> = members
                .iter()
                .filter(|member| member.category == category)
                .map(|member| member_statistics(member, records))
                .collect();
            let percentage_sum: f64 = stats.iter().map(|s| s.attendance_percentage).sum();
            CategoryStatistics {
                category,
                member_count: stats.len(),
                average_attendance_percentage: mean(percentage_sum, stats.len()),
                total_attended: stats.iter().map(|s| s.meetings_attended).sum(),
                total_possible: stats.len() * records.len(),
            }
        })
        .collect()
}

/// Trend over the most recent `policy.trend_window` meetings.
///
/// Percentages are relative to the current directory size. The direction
/// compares the first and last point; fewer than two points is stable.
#[must_use]
pub fn trend_analysis(
    members: &[Member],
    records: &[AttendanceRecord],
    policy: &StatisticsPolicy,
) -> TrendAnalysis {
    let ordered = chronological(records);
    let start = ordered.len().saturating_sub(policy.trend_window);
    let points: Vec<AttendanceTrend> = ordered[start..]
        .iter()
        .map(|record| AttendanceTrend {
            date: record.date,
            attendance_count: record.present_count(),
            attendance_percentage: percentage(record.present_count(), members.len()),
        })
        .collect();

    let change = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            last.attendance_percentage - first.attendance_percentage
        }
        _ => 0.0,
    };
    let direction = if change.abs() <= policy.stable_tolerance {
        TrendDirection::Stable
    } else if change > 0.0 {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };

    TrendAnalysis {
        points,
        direction,
        change,
    }
}

/// Compute every statistic at once, after dropping skipped dates.
#[must_use]
pub fn compute_report(
    members: &[Member],
    records: &[AttendanceRecord],
    policy: &StatisticsPolicy,
    order: MemberSortOrder,
) -> StatisticsReport {
    let records = policy.applicable(records);
    StatisticsReport {
        overall: overall_statistics(members, &records),
        members: all_member_statistics(members, &records, order),
        categories: category_statistics(members, &records),
        trend: trend_analysis(members, &records, policy),
        sort_order: order,
    }
}
