//! Turning a raw [`SheetGrid`] into members and attendance records.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use tracing::trace;

use super::{is_truthy, SheetGrid, FIRST_DATE_COLUMN, ID_COLUMN, NAME_COLUMN, STATUS_COLUMN};
use crate::dates;
use crate::error::Error;
use crate::model::{AttendanceRecord, Category, Member};

/// The result of interpreting a sheet.
#[derive(Debug, Default)]
pub struct ParsedSheet {
    /// Members in row order.
    pub members: Vec<Member>,
    /// Records in ascending date order.
    pub records: Vec<AttendanceRecord>,
    /// Number of columns in use; the next new date goes here.
    pub column_count: usize,
    /// Rows and columns that were skipped, as [`Error::MalformedData`].
    pub issues: Vec<Error>,
}

/// Interpret a grid.
///
/// Bad rows and columns are skipped and listed in [`ParsedSheet::issues`];
/// they never abort the parse. Fully blank rows and columns are ignored
/// without an issue.
#[must_use]
pub fn parse_grid(grid: &SheetGrid) -> ParsedSheet {
    let mut issues = Vec::new();
    let date_columns = date_columns(grid, &mut issues);

    let mut records: BTreeMap<NaiveDate, AttendanceRecord> = date_columns
        .iter()
        .map(|(column, date)| (*date, AttendanceRecord::new(*date, *column)))
        .collect();

    let mut members = Vec::new();
    let mut seen_ids = HashSet::new();

    for row in 1..grid.rows.len() {
        let Some((id, name, category)) = member_cells(grid, row, &mut issues) else {
            continue;
        };
        if !seen_ids.insert(id.to_string()) {
            issues.push(Error::malformed(
                format!("row {row}"),
                format!("duplicate member id '{id}'"),
            ));
            continue;
        }

        let mut member = Member::new(id, name, category, row);
        for (column, date) in &date_columns {
            let present = is_truthy(grid.cell(row, *column));
            let date_string = dates::canonical(*date);
            member.attendance_history.insert(date_string, present);
            if present {
                if let Some(record) = records.get_mut(date) {
                    record.mark_present(id, category);
                }
            }
        }
        trace!(row, id, "parsed member row");
        members.push(member);
    }

    ParsedSheet {
        members,
        records: records.into_values().collect(),
        column_count: grid.column_count().max(FIRST_DATE_COLUMN),
        issues,
    }
}

/// Header-parsed date columns, first occurrence of each date only.
fn date_columns(grid: &SheetGrid, issues: &mut Vec<Error>) -> Vec<(usize, NaiveDate)> {
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for column in FIRST_DATE_COLUMN..grid.column_count() {
        let header = grid.cell(0, column);
        if header.trim().is_empty() {
            continue;
        }
        let Some(date) = dates::parse_header(header) else {
            issues.push(Error::malformed(
                format!("column {column}"),
                format!("header '{header}' is not a date"),
            ));
            continue;
        };
        if !seen.insert(date) {
            issues.push(Error::malformed(
                format!("column {column}"),
                format!("date {date} already appears in an earlier column"),
            ));
            continue;
        }
        columns.push((column, date));
    }
    columns
}

/// Validate the fixed cells of a member row.
fn member_cells<'g>(
    grid: &'g SheetGrid,
    row: usize,
    issues: &mut Vec<Error>,
) -> Option<(&'g str, &'g str, Category)> {
    let id = grid.cell(row, ID_COLUMN).trim();
    let name = grid.cell(row, NAME_COLUMN).trim();
    let status = grid.cell(row, STATUS_COLUMN).trim();

    if id.is_empty() && name.is_empty() && status.is_empty() {
        return None;
    }
    let location = format!("row {row}");
    if id.is_empty() {
        issues.push(Error::malformed(location, "missing member id"));
        return None;
    }
    if name.is_empty() {
        issues.push(Error::malformed(location, "missing member name"));
        return None;
    }
    let Some(category) = Category::from_code(status) else {
        issues.push(Error::malformed(
            location,
            format!("unrecognized status code '{status}'"),
        ));
        return None;
    };
    Some((id, name, category))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scenario_grid() -> SheetGrid {
        SheetGrid::from_rows([
            vec!["ID", "Name", "Status", "2024-03-07", "2024-03-14", "2024-03-21"],
            vec!["alice", "Alice", "OM", "TRUE", "TRUE", "FALSE"],
            vec!["bob", "Bob", "XT", "FALSE", "TRUE", "TRUE"],
        ])
    }

    #[test]
    fn test_parse_members_and_records() {
        let parsed = parse_grid(&scenario_grid());

        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.members.len(), 2);
        assert_eq!(parsed.records.len(), 3);
        assert_eq!(parsed.column_count, 6);

        let alice = &parsed.members[0];
        assert_eq!(alice.row_index, 1);
        assert_eq!(alice.category, Category::OldMember);
        assert!(alice.was_present("2024-03-07"));
        assert!(!alice.was_present("2024-03-21"));
        assert_eq!(alice.attendance_history.len(), 3);

        let d2 = &parsed.records[1];
        assert_eq!(d2.date, date(2024, 3, 14));
        assert_eq!(d2.column_index, 4);
        assert_eq!(d2.present_count(), 2);
        assert_eq!(d2.category_total(Category::OldMember), 1);
        assert_eq!(d2.category_total(Category::ExtendedTeam), 1);
    }

    #[test]
    fn test_records_sorted_by_date_regardless_of_column_order() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status", "2024-03-14", "2024-03-07"],
            vec!["a", "A", "OM", "x", ""],
        ]);
        let parsed = parse_grid(&grid);
        assert_eq!(parsed.records[0].date, date(2024, 3, 7));
        assert_eq!(parsed.records[0].column_index, 4);
        assert_eq!(parsed.records[1].column_index, 3);
    }

    #[test]
    fn test_unparseable_header_column_is_skipped() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status", "Notes", "2024-03-07"],
            vec!["a", "A", "OM", "TRUE", "TRUE"],
        ]);
        let parsed = parse_grid(&grid);

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].is_malformed());
        assert!(parsed.issues[0].to_string().contains("column 3"));
        // The skipped column still occupies space in the sheet.
        assert_eq!(parsed.column_count, 5);
    }

    #[test]
    fn test_unknown_status_row_is_skipped_not_guessed() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status", "2024-03-07"],
            vec!["a", "A", "OM", "TRUE"],
            vec!["b", "B", "Leader", "TRUE"],
        ]);
        let parsed = parse_grid(&grid);

        assert_eq!(parsed.members.len(), 1);
        assert_eq!(parsed.issues.len(), 1);
        assert!(parsed.issues[0].to_string().contains("Leader"));
        // The skipped row contributes nothing to the record.
        assert_eq!(parsed.records[0].present_count(), 1);
    }

    #[test]
    fn test_missing_id_and_name_rows() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status"],
            vec!["", "Nameless", "OM"],
            vec!["x", "", "OM"],
            vec!["", "", ""],
        ]);
        let parsed = parse_grid(&grid);
        assert!(parsed.members.is_empty());
        assert_eq!(parsed.issues.len(), 2);
    }

    #[test]
    fn test_duplicate_id_and_date() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status", "2024-03-07", "07/03/2024"],
            vec!["a", "A", "OM", "TRUE", "FALSE"],
            vec!["a", "Again", "OM", "TRUE", "TRUE"],
        ]);
        let parsed = parse_grid(&grid);
        assert_eq!(parsed.members.len(), 1);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.issues.len(), 2);
        assert!(parsed.members[0].was_present("2024-03-07"));
    }

    #[test]
    fn test_member_row_index_keeps_sheet_position_after_skips() {
        let grid = SheetGrid::from_rows([
            vec!["ID", "Name", "Status"],
            vec!["a", "A", "??"],
            vec!["b", "B", "FT"],
        ]);
        let parsed = parse_grid(&grid);
        assert_eq!(parsed.members[0].row_index, 2);
    }

    #[test]
    fn test_header_only_sheet() {
        let parsed = parse_grid(&SheetGrid::with_fixed_headers());
        assert!(parsed.members.is_empty());
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.column_count, FIRST_DATE_COLUMN);
    }

    #[test]
    fn test_category_totals_match_present_members() {
        let parsed = parse_grid(&scenario_grid());
        for record in &parsed.records {
            let sum: usize = record.category_totals().values().sum();
            assert_eq!(sum, record.present_count());
        }
    }
}
