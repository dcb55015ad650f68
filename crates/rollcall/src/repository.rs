//! Keeps the in-memory roster in step with the remote sheet.
//!
//! The repository owns two collections, members and attendance records, and
//! publishes them together as one [`RosterSnapshot`] through a watch channel.
//! Consumers never see members from one load paired with records from another.
//!
//! Every remote call is bounded by the configured request timeout. Failures
//! are returned to the caller and also placed in a dismissible error slot;
//! the published roster is left exactly as it was.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dates;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Category, Member};
use crate::sheet::{parse_grid, MemberRow, ParsedSheet, SheetGrid, TabularSource, FIRST_DATE_COLUMN};

/// Default bound on a single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Members and records as of one publish.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    /// Incremented on every publish.
    pub version: u64,
    /// Members in sheet row order.
    pub members: Arc<Vec<Member>>,
    /// Records in ascending date order.
    pub records: Arc<Vec<AttendanceRecord>>,
    /// Columns in use on the sheet; a new date goes in this column.
    pub column_count: usize,
    /// Whether a load has ever been published.
    pub loaded: bool,
}

impl RosterSnapshot {
    /// Look up a member by id.
    #[must_use]
    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// The record for an exact date.
    #[must_use]
    pub fn record_for(&self, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.records.iter().find(|r| r.date == date)
    }
}

/// The error shown in the dismissible message slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    /// Repository operation that failed.
    pub operation: &'static str,
    /// One-line text for the user.
    pub message: String,
    /// Trying again may help.
    pub retryable: bool,
    /// The user has to sign in again.
    pub requires_reauth: bool,
}

impl ReportedError {
    fn new(operation: &'static str, error: &Error) -> Self {
        Self {
            operation,
            message: error.user_message(),
            retryable: error.is_retryable(),
            requires_reauth: error.requires_reauth(),
        }
    }
}

/// Outcome of [`AttendanceRepository::load_all`].
#[derive(Debug)]
pub struct LoadReport {
    /// Members parsed.
    pub members: usize,
    /// Records parsed.
    pub records: usize,
    /// Rows and columns skipped as malformed.
    pub skipped: Vec<Error>,
    /// A newer load or a write finished first, so nothing was published.
    pub superseded: bool,
}

/// Reads and writes the attendance sheet and publishes the roster.
#[derive(Debug)]
pub struct AttendanceRepository {
    source: Arc<dyn TabularSource>,
    roster: watch::Sender<RosterSnapshot>,
    errors: watch::Sender<Option<ReportedError>>,
    generation: AtomicU64,
    write_gate: Mutex<()>,
    request_timeout: Duration,
}

impl AttendanceRepository {
    /// Create a repository over a sheet. Nothing is loaded until
    /// [`load_all`](Self::load_all).
    #[must_use]
    pub fn new(source: Arc<dyn TabularSource>, request_timeout: Duration) -> Self {
        let (roster, _) = watch::channel(RosterSnapshot::default());
        let (errors, _) = watch::channel(None);
        Self {
            source,
            roster,
            errors,
            generation: AtomicU64::new(0),
            write_gate: Mutex::new(()),
            request_timeout,
        }
    }

    /// The current roster.
    #[must_use]
    pub fn snapshot(&self) -> RosterSnapshot {
        self.roster.borrow().clone()
    }

    /// Watch roster publishes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RosterSnapshot> {
        self.roster.subscribe()
    }

    /// Watch the error slot.
    #[must_use]
    pub fn subscribe_errors(&self) -> watch::Receiver<Option<ReportedError>> {
        self.errors.subscribe()
    }

    /// The error currently in the slot.
    #[must_use]
    pub fn last_error(&self) -> Option<ReportedError> {
        self.errors.borrow().clone()
    }

    /// Dismiss the reported error.
    pub fn clear_error(&self) {
        self.errors.send_if_modified(|slot| slot.take().is_some());
    }

    /// Read the whole sheet and publish members and records together.
    ///
    /// Malformed rows and columns are skipped and listed in the report. If
    /// member rows exist but none of them is usable the load fails. When a
    /// newer load or a write completes first, this load publishes nothing and
    /// returns a report with `superseded` set.
    ///
    /// # Errors
    ///
    /// Returns the sheet error (network, auth, timeout) or
    /// [`Error::MalformedData`] for a sheet with no usable members. The
    /// previously published roster is kept. If a newer load or a write was
    /// issued meanwhile, the failure comes back as [`Error::Superseded`] and
    /// the error slot is left alone.
    pub async fn load_all(&self) -> Result<LoadReport> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(ticket, "loading sheet");

        let grid = self
            .remote("read_grid", self.source.read_grid())
            .await
            .map_err(|e| self.report_load(ticket, e))?;

        let ParsedSheet {
            members,
            records,
            column_count,
            issues,
        } = parse_grid(&grid);
        for issue in &issues {
            warn!(%issue, "skipped malformed sheet data");
        }
        if members.is_empty() && has_member_rows(&grid) {
            return Err(self.report_load(
                ticket,
                Error::malformed("sheet", "no usable member rows"),
            ));
        }

        let (member_count, record_count) = (members.len(), records.len());
        let published = self.roster.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *current = RosterSnapshot {
                version: current.version + 1,
                members: Arc::new(members),
                records: Arc::new(records),
                column_count,
                loaded: true,
            };
            true
        });

        if published {
            info!(
                ticket,
                members = member_count,
                records = record_count,
                skipped = issues.len(),
                "sheet loaded"
            );
        } else {
            warn!(ticket, "load superseded by a newer request; result dropped");
        }
        Ok(LoadReport {
            members: member_count,
            records: record_count,
            skipped: issues,
            superseded: !published,
        })
    }

    /// Save who was present on `date`.
    ///
    /// The date's column is reused if it exists, otherwise a new column is
    /// added at the end. Every member row's cell is written in one call, so
    /// saving the same selection twice leaves the sheet unchanged. Ids that
    /// are not in the roster are ignored.
    ///
    /// # Errors
    ///
    /// Returns the sheet error if the write fails; no local state changes.
    pub async fn save_attendance(
        &self,
        selected: &BTreeSet<String>,
        date: NaiveDate,
    ) -> Result<AttendanceRecord> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot();
        if !snapshot.loaded {
            return Err(self.report(
                "save_attendance",
                Error::invalid_input("The sheet has not been loaded yet."),
            ));
        }

        let existing = snapshot.record_for(date);
        let column = existing.map_or(snapshot.column_count.max(FIRST_DATE_COLUMN), |r| {
            r.column_index
        });
        let cells: Vec<(usize, bool)> = snapshot
            .members
            .iter()
            .map(|m| (m.row_index, selected.contains(&m.id)))
            .collect();
        let unknown = selected
            .iter()
            .filter(|id| snapshot.member(id).is_none())
            .count();
        if unknown > 0 {
            debug!(unknown, "ignoring selected ids missing from the roster");
        }

        self.remote(
            "write_column",
            self.source
                .write_column(column, dates::canonical(date), cells),
        )
        .await
        .map_err(|e| self.report("save_attendance", e))?;

        let mut record = AttendanceRecord::new(date, column);
        for member in snapshot.members.iter() {
            if selected.contains(&member.id) {
                record.mark_present(&member.id, member.category);
            }
        }
        let new_column = existing.is_none();
        info!(
            date = %record.date_string,
            column,
            present = record.present_count(),
            new_column,
            "attendance saved"
        );

        let saved = record.clone();
        self.commit(|members, records, column_count| {
            for member in members.iter_mut() {
                *member = member.with_attendance(&saved.date_string, saved.is_present(&member.id));
            }
            match records.binary_search_by_key(&saved.date, |r| r.date) {
                Ok(index) => records[index] = saved,
                Err(index) => records.insert(index, saved),
            }
            *column_count = (*column_count).max(column + 1);
        });
        Ok(record)
    }

    /// Add a member at the end of the sheet with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name, or the sheet error.
    pub async fn add_member(&self, name: &str, category: Category) -> Result<Member> {
        let name = validate_name(name).map_err(|e| self.report("add_member", e))?;
        let _gate = self.write_gate.lock().await;

        let id = Uuid::new_v4().to_string();
        let row = MemberRow {
            id: id.clone(),
            name: name.to_string(),
            status: category.code().to_string(),
        };
        let row_index = self
            .remote("append_row", self.source.append_row(row))
            .await
            .map_err(|e| self.report("add_member", e))?;

        let mut member = Member::new(id, name, category, row_index);
        for record in self.snapshot().records.iter() {
            member
                .attendance_history
                .insert(record.date_string.clone(), false);
        }
        info!(id = %member.id, row_index, "member added");

        let added = member.clone();
        self.commit(move |members, _, _| members.push(added));
        Ok(member)
    }

    /// Rename or recategorize a member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::InvalidInput`]
    /// for a blank name, or the sheet error.
    pub async fn update_member(&self, id: &str, name: &str, category: Category) -> Result<Member> {
        let name = validate_name(name).map_err(|e| self.report("update_member", e))?;
        let _gate = self.write_gate.lock().await;

        let current = self
            .snapshot()
            .member(id)
            .cloned()
            .ok_or_else(|| self.report("update_member", Error::not_found("member", id)))?;
        let row = MemberRow {
            id: current.id.clone(),
            name: name.to_string(),
            status: category.code().to_string(),
        };
        self.remote(
            "update_row",
            self.source.update_row(current.row_index, row),
        )
        .await
        .map_err(|e| self.report("update_member", e))?;

        let updated = current.with_details(name, category);
        info!(id, row_index = updated.row_index, "member updated");

        let replacement = updated.clone();
        self.commit(move |members, records, _| {
            if let Some(slot) = members.iter_mut().find(|m| m.id == replacement.id) {
                *slot = replacement;
            }
            for record in records.iter_mut() {
                record.recategorize(&current.id, category);
            }
        });
        Ok(updated)
    }

    /// Delete a member; members below move up one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or the sheet error.
    pub async fn delete_member(&self, id: &str) -> Result<Member> {
        let _gate = self.write_gate.lock().await;

        let removed = self
            .snapshot()
            .member(id)
            .cloned()
            .ok_or_else(|| self.report("delete_member", Error::not_found("member", id)))?;
        self.remote("delete_row", self.source.delete_row(removed.row_index))
            .await
            .map_err(|e| self.report("delete_member", e))?;
        info!(id, row_index = removed.row_index, "member deleted");

        let gone = removed.clone();
        self.commit(move |members, records, _| {
            members.retain(|m| m.id != gone.id);
            for member in members.iter_mut() {
                if member.row_index > gone.row_index {
                    *member = member.with_row_index(member.row_index - 1);
                }
            }
            for record in records.iter_mut() {
                record.mark_absent(&gone.id);
            }
        });
        Ok(removed)
    }

    /// Publish a locally applied write and drop any load still in flight.
    fn commit(
        &self,
        update: impl FnOnce(&mut Vec<Member>, &mut Vec<AttendanceRecord>, &mut usize),
    ) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.roster.send_modify(|snapshot| {
            update(
                Arc::make_mut(&mut snapshot.members),
                Arc::make_mut(&mut snapshot.records),
                &mut snapshot.column_count,
            );
            snapshot.version += 1;
        });
    }

    async fn remote<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation)),
        }
    }

    /// Report a load failure unless a newer request has replaced this load.
    fn report_load(&self, ticket: u64, error: Error) -> Error {
        if self.generation.load(Ordering::SeqCst) == ticket {
            return self.report("load", error);
        }
        warn!(ticket, error = %error, "superseded load failed; error slot untouched");
        Error::superseded("load", error)
    }

    fn report(&self, operation: &'static str, error: Error) -> Error {
        warn!(operation, error = %error, "repository operation failed");
        self.errors
            .send_replace(Some(ReportedError::new(operation, &error)));
        error
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(Error::invalid_input("Member name cannot be empty."))
    } else {
        Ok(trimmed)
    }
}

/// Whether any row below the header has something in its fixed cells.
fn has_member_rows(grid: &SheetGrid) -> bool {
    (1..grid.rows.len())
        .any(|row| (0..FIRST_DATE_COLUMN).any(|column| !grid.cell(row, column).trim().is_empty()))
}
