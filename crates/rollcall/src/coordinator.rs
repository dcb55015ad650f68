//! Presentation state: the selected date, who is marked present, and the
//! messages shown to the user.
//!
//! The coordinator owns the selection and the date; the roster comes from
//! the [`AttendanceRepository`] and statistics from a [`StatisticsService`].
//! Selection changes are synchronous. Anything that talks to the sheet is
//! async and goes through the repository.
//!
//! [`AttendanceCoordinator::view`] combines roster, selection and date into
//! one [`ViewSnapshot`]. The snapshot is rebuilt only when one of those three
//! inputs changes; asking for it again returns the same `Arc`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dates::{self, MeetingSchedule};
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, Category, Member};
use crate::repository::{AttendanceRepository, LoadReport, RosterSnapshot};
use crate::settings::SettingsStore;
use crate::stats::{MemberSortOrder, StatisticsPolicy, StatisticsReport, StatisticsService};

/// Kind of a transient message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// An action completed.
    Success,
    /// An action failed.
    Error,
    /// Neutral information.
    Info,
}

/// A one-line, dismissible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiMessage {
    /// What kind of message this is.
    pub kind: MessageKind,
    /// Text to show.
    pub text: String,
}

/// Where the current selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSeed {
    /// The saved record for the selected date.
    Existing,
    /// The record from exactly one week earlier.
    PreviousWeek,
    /// Nothing to seed from.
    Empty,
}

/// One member line in the roll-call view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    /// Member id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the member is marked present.
    pub selected: bool,
}

/// Members of one category, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberGroup {
    /// The category.
    pub category: Category,
    /// Members in the category.
    pub members: Vec<MemberView>,
}

/// Everything the roll-call screen renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSnapshot {
    /// Selected meeting date.
    pub date: NaiveDate,
    /// Non-empty categories in display order.
    pub groups: Vec<MemberGroup>,
    /// Members marked present.
    pub selected_count: usize,
    /// Members in the directory.
    pub total_members: usize,
    /// Whether the date already has a saved record.
    pub saved: bool,
    /// Where the selection came from.
    pub seed: SelectionSeed,
}

#[derive(Debug)]
struct Selection {
    date: NaiveDate,
    present: BTreeSet<String>,
    seed: SelectionSeed,
    revision: u64,
}

impl Selection {
    fn reseed(&mut self, roster: &RosterSnapshot) {
        let (present, seed) = seed_selection(roster, self.date);
        self.present = present;
        self.seed = seed;
        self.revision += 1;
    }
}

type ViewKey = (u64, u64, NaiveDate);

/// Seed a selection for `date`: the saved record, else last week's, else empty.
#[must_use]
pub fn seed_selection(
    roster: &RosterSnapshot,
    date: NaiveDate,
) -> (BTreeSet<String>, SelectionSeed) {
    let known = |record: &AttendanceRecord| -> BTreeSet<String> {
        record
            .present_members()
            .filter(|id| roster.member(id).is_some())
            .map(str::to_string)
            .collect()
    };
    if let Some(record) = roster.record_for(date) {
        return (known(record), SelectionSeed::Existing);
    }
    if let Some(record) = roster.record_for(date - Duration::days(7)) {
        return (known(record), SelectionSeed::PreviousWeek);
    }
    (BTreeSet::new(), SelectionSeed::Empty)
}

/// Drives the roll-call and statistics screens.
#[derive(Debug)]
pub struct AttendanceCoordinator {
    repository: Arc<AttendanceRepository>,
    statistics: StatisticsService,
    settings: Arc<dyn SettingsStore>,
    selection: Mutex<Selection>,
    message: watch::Sender<Option<UiMessage>>,
    view: watch::Sender<Option<Arc<ViewSnapshot>>>,
    memo: Mutex<Option<(ViewKey, Arc<ViewSnapshot>)>>,
    view_builds: AtomicUsize,
}

impl AttendanceCoordinator {
    /// Create a coordinator with the date set to the upcoming meeting day.
    ///
    /// The sort preference is read from `settings` here and nowhere else; an
    /// unreadable value falls back to the default order.
    #[must_use]
    pub fn new(
        repository: Arc<AttendanceRepository>,
        settings: Arc<dyn SettingsStore>,
        schedule: MeetingSchedule,
        policy: StatisticsPolicy,
        today: NaiveDate,
    ) -> Self {
        let sort_order = match settings.load_sort_order() {
            Ok(order) => order.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not read saved sort order; using default");
                MemberSortOrder::default()
            }
        };
        let date = schedule.upcoming_date(today);
        let (present, seed) = seed_selection(&repository.snapshot(), date);
        let (message, _) = watch::channel(None);
        let (view, _) = watch::channel(None);

        Self {
            repository,
            statistics: StatisticsService::new(policy, sort_order),
            settings,
            selection: Mutex::new(Selection {
                date,
                present,
                seed,
                revision: 0,
            }),
            message,
            view,
            memo: Mutex::new(None),
            view_builds: AtomicUsize::new(0),
        }
    }

    /// The repository this coordinator drives.
    #[must_use]
    pub fn repository(&self) -> &AttendanceRepository {
        &self.repository
    }

    // === Selection ===

    /// The selected meeting date.
    #[must_use]
    pub fn selected_date(&self) -> NaiveDate {
        self.lock_selection().date
    }

    /// Ids currently marked present.
    #[must_use]
    pub fn selection(&self) -> BTreeSet<String> {
        self.lock_selection().present.clone()
    }

    /// Where the current selection came from.
    #[must_use]
    pub fn selection_seed(&self) -> SelectionSeed {
        self.lock_selection().seed
    }

    /// Change the date and reseed the selection for it.
    pub fn set_selected_date(&self, date: NaiveDate) {
        let roster = self.repository.snapshot();
        {
            let mut selection = self.lock_selection();
            selection.date = date;
            selection.reseed(&roster);
            debug!(date = %date, seed = ?selection.seed, "selected date changed");
        }
        self.sync();
    }

    /// Flip one member's presence. Returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is not in the roster.
    pub fn toggle(&self, id: &str) -> Result<bool> {
        self.ensure_member(id)?;
        let present = {
            let mut selection = self.lock_selection();
            let present = if selection.present.remove(id) {
                false
            } else {
                selection.present.insert(id.to_string());
                true
            };
            selection.revision += 1;
            present
        };
        self.sync();
        Ok(present)
    }

    /// Mark one member present or absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is not in the roster.
    pub fn set_present(&self, id: &str, present: bool) -> Result<()> {
        self.ensure_member(id)?;
        self.update_selection(|set| {
            if present {
                set.insert(id.to_string())
            } else {
                set.remove(id)
            }
        });
        Ok(())
    }

    /// Mark every member of a category present or absent.
    pub fn select_category(&self, category: Category, present: bool) {
        let roster = self.repository.snapshot();
        self.update_selection(|set| {
            let mut changed = false;
            for member in roster.members.iter().filter(|m| m.category == category) {
                changed |= if present {
                    set.insert(member.id.clone())
                } else {
                    set.remove(&member.id)
                };
            }
            changed
        });
    }

    /// Mark everyone absent.
    pub fn clear_selection(&self) {
        self.update_selection(|set| {
            let changed = !set.is_empty();
            set.clear();
            changed
        });
    }

    // === Sheet actions ===

    /// Reload the roster and reseed the selection for the selected date.
    ///
    /// # Errors
    ///
    /// Returns the load error; the roster and selection are kept. A load
    /// that a newer one replaced fails quietly, without a message.
    pub async fn refresh(&self) -> Result<LoadReport> {
        match self.repository.load_all().await {
            Ok(report) => {
                if !report.superseded {
                    let roster = self.repository.snapshot();
                    self.lock_selection().reseed(&roster);
                    if !report.skipped.is_empty() {
                        self.show(
                            MessageKind::Info,
                            format!("Skipped {} unreadable rows or columns.", report.skipped.len()),
                        );
                    }
                    self.sync();
                }
                Ok(report)
            }
            Err(e) if e.is_superseded() => {
                debug!(error = %e, "refresh replaced by a newer one");
                Err(e)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Save the selection for the selected date.
    ///
    /// The success message appears only after the sheet accepted the write.
    ///
    /// # Errors
    ///
    /// Returns the save error; nothing local changes.
    pub async fn save(&self) -> Result<AttendanceRecord> {
        let (present, date) = {
            let selection = self.lock_selection();
            (selection.present.clone(), selection.date)
        };
        match self.repository.save_attendance(&present, date).await {
            Ok(record) => {
                {
                    let mut selection = self.lock_selection();
                    if selection.date == date {
                        selection.seed = SelectionSeed::Existing;
                    }
                }
                info!(date = %record.date_string, "attendance saved from selection");
                self.show(
                    MessageKind::Success,
                    format!(
                        "Saved attendance for {}: {} present.",
                        dates::canonical(date),
                        record.present_count()
                    ),
                );
                self.sync();
                Ok(record)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Add a member.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn add_member(&self, name: &str, category: Category) -> Result<Member> {
        match self.repository.add_member(name, category).await {
            Ok(member) => {
                self.show(MessageKind::Success, format!("Added {}.", member.name));
                self.sync();
                Ok(member)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Rename or recategorize a member.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn update_member(&self, id: &str, name: &str, category: Category) -> Result<Member> {
        match self.repository.update_member(id, name, category).await {
            Ok(member) => {
                self.show(MessageKind::Success, format!("Updated {}.", member.name));
                self.sync();
                Ok(member)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Delete a member and drop them from the selection.
    ///
    /// # Errors
    ///
    /// Returns the repository error.
    pub async fn delete_member(&self, id: &str) -> Result<Member> {
        match self.repository.delete_member(id).await {
            Ok(member) => {
                self.update_selection(|set| set.remove(id));
                self.show(MessageKind::Success, format!("Removed {}.", member.name));
                self.sync();
                Ok(member)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    // === Statistics ===

    /// Recompute statistics over the current roster in the background.
    pub fn compute_statistics(&self) -> JoinHandle<()> {
        let roster = self.repository.snapshot();
        self.statistics.start(roster.members, roster.records)
    }

    /// The latest statistics report.
    #[must_use]
    pub fn statistics(&self) -> Option<Arc<StatisticsReport>> {
        self.statistics.latest()
    }

    /// Watch statistics reports.
    #[must_use]
    pub fn subscribe_statistics(&self) -> watch::Receiver<Option<Arc<StatisticsReport>>> {
        self.statistics.subscribe()
    }

    /// The statistics policy in use.
    #[must_use]
    pub fn statistics_policy(&self) -> &StatisticsPolicy {
        self.statistics.policy()
    }

    /// Current member sort order.
    #[must_use]
    pub fn sort_order(&self) -> MemberSortOrder {
        self.statistics.sort_order()
    }

    /// Change the member sort order and persist it.
    ///
    /// # Errors
    ///
    /// Returns the settings error. The new order still applies for this
    /// session.
    pub fn set_sort_order(&self, order: MemberSortOrder) -> Result<()> {
        self.statistics.set_sort_order(order);
        self.settings
            .save_sort_order(order)
            .map_err(|e| self.fail(e))
    }

    // === Messages ===

    /// The message currently shown.
    #[must_use]
    pub fn message(&self) -> Option<UiMessage> {
        self.message.borrow().clone()
    }

    /// Watch the message slot.
    #[must_use]
    pub fn subscribe_messages(&self) -> watch::Receiver<Option<UiMessage>> {
        self.message.subscribe()
    }

    /// Dismiss the current message and any reported repository error.
    pub fn dismiss_message(&self) {
        self.message.send_if_modified(|slot| slot.take().is_some());
        self.repository.clear_error();
    }

    // === View ===

    /// The combined roll-call view, rebuilt only when its inputs changed.
    #[must_use]
    pub fn view(&self) -> Arc<ViewSnapshot> {
        let roster = self.repository.snapshot();
        let selection = self.lock_selection();
        let key = (roster.version, selection.revision, selection.date);

        let mut memo = lock(&self.memo);
        if let Some((cached_key, cached)) = memo.as_ref() {
            if *cached_key == key {
                return Arc::clone(cached);
            }
        }
        let built = Arc::new(build_view(&roster, &selection));
        self.view_builds.fetch_add(1, Ordering::Relaxed);
        *memo = Some((key, Arc::clone(&built)));
        built
    }

    /// How many times the view has been built.
    #[must_use]
    pub fn view_builds(&self) -> usize {
        self.view_builds.load(Ordering::Relaxed)
    }

    /// Watch published views.
    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<Option<Arc<ViewSnapshot>>> {
        self.view.subscribe()
    }

    /// Publish the view if any input changed since the last publish.
    ///
    /// Call this after the roster changed outside the coordinator.
    pub fn sync(&self) {
        let view = self.view();
        self.view.send_if_modified(|slot| {
            if slot
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &view))
            {
                return false;
            }
            *slot = Some(view);
            true
        });
    }

    // === Internals ===

    fn lock_selection(&self) -> MutexGuard<'_, Selection> {
        lock(&self.selection)
    }

    fn ensure_member(&self, id: &str) -> Result<()> {
        if self.repository.snapshot().member(id).is_some() {
            Ok(())
        } else {
            Err(Error::not_found("member", id))
        }
    }

    fn update_selection(&self, change: impl FnOnce(&mut BTreeSet<String>) -> bool) {
        let changed = {
            let mut selection = self.lock_selection();
            let changed = change(&mut selection.present);
            if changed {
                selection.revision += 1;
            }
            changed
        };
        if changed {
            self.sync();
        }
    }

    fn show(&self, kind: MessageKind, text: String) {
        self.message.send_replace(Some(UiMessage { kind, text }));
    }

    fn fail(&self, error: Error) -> Error {
        self.show(MessageKind::Error, error.user_message());
        error
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn build_view(roster: &RosterSnapshot, selection: &Selection) -> ViewSnapshot {
    let groups: Vec<MemberGroup> = Category::ALL
        .into_iter()
        .filter_map(|category| {
            let mut members: Vec<MemberView> = roster
                .members
                .iter()
                .filter(|m| m.category == category)
                .map(|m| MemberView {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    selected: selection.present.contains(&m.id),
                })
                .collect();
            if members.is_empty() {
                return None;
            }
            members.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            });
            Some(MemberGroup { category, members })
        })
        .collect();

    ViewSnapshot {
        date: selection.date,
        selected_count: groups
            .iter()
            .flat_map(|g| &g.members)
            .filter(|m| m.selected)
            .count(),
        total_members: roster.members.len(),
        saved: roster.record_for(selection.date).is_some(),
        seed: selection.seed,
        groups,
    }
}
