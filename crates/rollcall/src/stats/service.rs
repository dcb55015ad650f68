//! Background statistics computation with a single published result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use super::{compute_report, MemberSortOrder, StatisticsPolicy, StatisticsReport};
use crate::model::{AttendanceRecord, Member};

/// Runs statistics off the calling task and publishes the newest report.
///
/// Starting a computation aborts the previous one. Each run carries a
/// generation number and only the latest generation may publish, so a slow
/// stale run can never overwrite a newer report. A failed run leaves the
/// previous report in place.
#[derive(Debug)]
pub struct StatisticsService {
    policy: Arc<StatisticsPolicy>,
    sort_order: Arc<Mutex<MemberSortOrder>>,
    report: Arc<watch::Sender<Option<Arc<StatisticsReport>>>>,
    generation: Arc<AtomicU64>,
    running: Mutex<Option<AbortHandle>>,
}

impl StatisticsService {
    /// Create a service with no report yet.
    #[must_use]
    pub fn new(policy: StatisticsPolicy, sort_order: MemberSortOrder) -> Self {
        let (report, _) = watch::channel(None);
        Self {
            policy: Arc::new(policy),
            sort_order: Arc::new(Mutex::new(sort_order)),
            report: Arc::new(report),
            generation: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// The policy every computation uses.
    #[must_use]
    pub fn policy(&self) -> &StatisticsPolicy {
        &self.policy
    }

    /// Current member sort order.
    #[must_use]
    pub fn sort_order(&self) -> MemberSortOrder {
        current_order(&self.sort_order)
    }

    /// Change the member sort order and reorder the published report.
    pub fn set_sort_order(&self, order: MemberSortOrder) {
        if let Ok(mut guard) = self.sort_order.lock() {
            *guard = order;
        }
        self.report.send_if_modified(|slot| {
            let Some(current) = slot.as_ref() else {
                return false;
            };
            if current.sort_order == order {
                return false;
            }
            let mut resorted = StatisticsReport::clone(current);
            resorted.resort(order);
            *slot = Some(Arc::new(resorted));
            true
        });
    }

    /// The latest published report.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<StatisticsReport>> {
        self.report.borrow().clone()
    }

    /// Watch published reports.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<StatisticsReport>>> {
        self.report.subscribe()
    }

    /// Start computing a report, cancelling any run still in flight.
    ///
    /// The returned handle completes once the run has published (or been
    /// discarded); callers that do not care can drop it.
    pub fn start(
        &self,
        members: Arc<Vec<Member>>,
        records: Arc<Vec<AttendanceRecord>>,
    ) -> JoinHandle<()> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let policy = Arc::clone(&self.policy);
        let sort_order = Arc::clone(&self.sort_order);
        let report = Arc::clone(&self.report);
        let generation = Arc::clone(&self.generation);

        let handle = tokio::spawn(async move {
            let order = current_order(&sort_order);
            let computed = tokio::task::spawn_blocking(move || {
                compute_report(&members, &records, &policy, order)
            })
            .await;

            let computed = match computed {
                Ok(computed) => computed,
                Err(e) => {
                    warn!(
                        ticket,
                        error = %e,
                        "statistics computation failed; keeping previous report"
                    );
                    return;
                }
            };

            if publish(&report, &generation, ticket, &sort_order, computed) {
                debug!(ticket, "statistics report published");
            } else {
                debug!(ticket, "statistics report superseded");
            }
        });

        if let Ok(mut running) = self.running.lock() {
            if let Some(previous) = running.replace(handle.abort_handle()) {
                previous.abort();
            }
        }
        handle
    }
}

/// Publish `computed` if `ticket` is still the latest generation.
fn publish(
    report: &watch::Sender<Option<Arc<StatisticsReport>>>,
    generation: &AtomicU64,
    ticket: u64,
    sort_order: &Mutex<MemberSortOrder>,
    mut computed: StatisticsReport,
) -> bool {
    report.send_if_modified(|slot| {
        if generation.load(Ordering::SeqCst) != ticket {
            return false;
        }
        let order = current_order(sort_order);
        if computed.sort_order != order {
            computed.resort(order);
        }
        *slot = Some(Arc::new(computed));
        true
    })
}

fn current_order(sort_order: &Mutex<MemberSortOrder>) -> MemberSortOrder {
    sort_order
        .lock()
        .map(|guard| *guard)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::Category;

    fn fixture() -> (Arc<Vec<Member>>, Arc<Vec<AttendanceRecord>>) {
        let members = vec![
            Member::new("alice", "Alice", Category::OldMember, 1),
            Member::new("bob", "Bob", Category::ExtendedTeam, 2),
        ];
        let mut record = AttendanceRecord::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(), 3);
        record.mark_present("bob", Category::ExtendedTeam);
        (Arc::new(members), Arc::new(vec![record]))
    }

    #[tokio::test]
    async fn test_start_publishes_report() {
        let service =
            StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::default());
        assert!(service.latest().is_none());

        let (members, records) = fixture();
        service.start(members, records).await.unwrap();

        let report = service.latest().unwrap();
        assert_eq!(report.overall.total_meetings, 1);
        assert_eq!(report.members[0].member_id, "bob");
    }

    #[tokio::test]
    async fn test_newer_start_wins() {
        let service = StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::Name);
        let (members, records) = fixture();

        let stale = service.start(Arc::clone(&members), Arc::new(Vec::new()));
        let fresh = service.start(members, records);
        let _ = stale.await;
        fresh.await.unwrap();

        let report = service.latest().unwrap();
        assert_eq!(report.overall.total_meetings, 1);
    }

    #[tokio::test]
    async fn test_late_stale_result_does_not_replace_fresh_report() {
        let service = StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::Name);
        let (members, records) = fixture();
        let stale_ticket = service.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let stale = compute_report(
            &members,
            &[],
            &StatisticsPolicy::default(),
            MemberSortOrder::Name,
        );

        // The stale run was issued first; the fresh one publishes before it lands.
        service.start(members, records).await.unwrap();
        assert!(!publish(
            &service.report,
            &service.generation,
            stale_ticket,
            &service.sort_order,
            stale,
        ));

        let report = service.latest().unwrap();
        assert_eq!(report.overall.total_meetings, 1);
    }

    #[tokio::test]
    async fn test_current_ticket_publishes_in_current_order() {
        let service = StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::Name);
        let (members, records) = fixture();
        let computed = compute_report(
            &members,
            &records,
            &StatisticsPolicy::default(),
            MemberSortOrder::AttendanceDesc,
        );
        let ticket = service.generation.load(Ordering::SeqCst);

        assert!(publish(
            &service.report,
            &service.generation,
            ticket,
            &service.sort_order,
            computed,
        ));
        let report = service.latest().unwrap();
        assert_eq!(report.sort_order, MemberSortOrder::Name);
        assert_eq!(report.members[0].member_id, "alice");
    }

    #[tokio::test]
    async fn test_set_sort_order_resorts_published_report() {
        let service =
            StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::default());
        let mut updates = service.subscribe();
        let (members, records) = fixture();
        service.start(members, records).await.unwrap();
        let _ = updates.borrow_and_update();

        service.set_sort_order(MemberSortOrder::Name);
        assert!(updates.has_changed().unwrap());
        let report = service.latest().unwrap();
        assert_eq!(report.sort_order, MemberSortOrder::Name);
        assert_eq!(report.members[0].member_id, "alice");
        assert_eq!(service.sort_order(), MemberSortOrder::Name);

        // Same order again publishes nothing.
        let _ = updates.borrow_and_update();
        service.set_sort_order(MemberSortOrder::Name);
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_empty_inputs_publish_zeroes() {
        let service =
            StatisticsService::new(StatisticsPolicy::default(), MemberSortOrder::default());
        service
            .start(Arc::new(Vec::new()), Arc::new(Vec::new()))
            .await
            .unwrap();
        let report = service.latest().unwrap();
        assert_eq!(report.overall.total_members, 0);
        assert_eq!(report.overall.most_recent_meeting, None);
        assert!(report.members.is_empty());
    }
}
