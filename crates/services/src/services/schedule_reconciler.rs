//! Lazy, on-read roll-forward of stored rent due dates.
//!
//! There is no background job keeping due dates fresh. Every read path that
//! exposes a due date runs the records through [`ScheduleReconciler`] first, so a
//! stored date that has lapsed is recomputed and written back before anyone sees it.

use async_trait::async_trait;
use chrono::NaiveDate;
use db::{
    DBService,
    models::tenancy::{RentSchedule, Tenancy},
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::due_date::{self, ScheduleError};

/// Persistence collaborator for rent schedules
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn load_schedule(&self, tenancy_id: Uuid) -> Result<Option<RentSchedule>, sqlx::Error>;

    async fn save_due_date(&self, tenancy_id: Uuid, due_date: NaiveDate) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl ScheduleStore for DBService {
    async fn load_schedule(&self, tenancy_id: Uuid) -> Result<Option<RentSchedule>, sqlx::Error> {
        Tenancy::find_schedule(&self.pool, tenancy_id).await
    }

    async fn save_due_date(&self, tenancy_id: Uuid, due_date: NaiveDate) -> Result<(), sqlx::Error> {
        let rows = Tenancy::update_due_date(&self.pool, tenancy_id, due_date).await?;
        if rows == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("failed to persist due date: {0}")]
    Persistence(#[source] sqlx::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What happened to a record during reconciliation
#[derive(Debug)]
pub enum ReconcileStatus {
    /// Stored due date was still current; nothing was written
    Current,
    /// Due date was recomputed and written back
    RolledForward { previous: Option<NaiveDate> },
    /// Due date was recomputed but the write failed.
    ///
    /// The returned schedule still carries the fresh date.
    PersistenceFailed {
        previous: Option<NaiveDate>,
        error: ReconcileError,
    },
}

/// A schedule after reconciliation, with the outcome of any write
#[derive(Debug)]
pub struct Reconciled {
    pub schedule: RentSchedule,
    pub status: ReconcileStatus,
}

impl Reconciled {
    pub fn was_rolled_forward(&self) -> bool {
        !matches!(self.status, ReconcileStatus::Current)
    }

    pub fn persistence_error(&self) -> Option<&ReconcileError> {
        match &self.status {
            ReconcileStatus::PersistenceFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of reconciling a listing of records
#[derive(Debug, Default)]
pub struct ReconcileBatch {
    /// Every input record, in input order, with fresh due dates where they could be computed
    pub schedules: Vec<RentSchedule>,
    /// Records whose schedule was invalid or whose write failed
    pub failures: Vec<(Uuid, ReconcileError)>,
}

impl ReconcileBatch {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ScheduleReconciler<S> {
    store: S,
}

impl<S: ScheduleStore> ScheduleReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Roll `schedule` forward if its due date is missing or before `today`.
    ///
    /// Returns `Err` only when the schedule itself is invalid. A failed write is
    /// reported through [`Reconciled::persistence_error`] alongside the fresh date.
    pub async fn reconcile(
        &self,
        mut schedule: RentSchedule,
        today: NaiveDate,
    ) -> Result<Reconciled, ReconcileError> {
        if schedule.due_date.is_some_and(|due| due >= today) {
            return Ok(Reconciled {
                schedule,
                status: ReconcileStatus::Current,
            });
        }

        let previous = schedule.due_date;
        let next = due_date::next_due_date(
            previous,
            schedule.schedule_type,
            schedule.schedule_value,
            today,
        )?;
        schedule.due_date = Some(next);

        let status = match self.store.save_due_date(schedule.tenancy_id, next).await {
            Ok(()) => {
                debug!(
                    tenancy_id = %schedule.tenancy_id,
                    previous = ?previous,
                    due_date = %next,
                    "Rolled due date forward"
                );
                ReconcileStatus::RolledForward { previous }
            }
            Err(e) => ReconcileStatus::PersistenceFailed {
                previous,
                error: ReconcileError::Persistence(e),
            },
        };

        Ok(Reconciled { schedule, status })
    }

    /// Load a schedule through the store and reconcile it
    pub async fn reconcile_by_id(
        &self,
        tenancy_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<Reconciled>, ReconcileError> {
        let Some(schedule) = self.store.load_schedule(tenancy_id).await? else {
            return Ok(None);
        };
        self.reconcile(schedule, today).await.map(Some)
    }

    /// Reconcile every record of a listing.
    ///
    /// A record with an invalid stored schedule passes through unchanged and is
    /// reported in [`ReconcileBatch::failures`]; it never fails the whole listing.
    pub async fn reconcile_all(
        &self,
        schedules: Vec<RentSchedule>,
        today: NaiveDate,
    ) -> ReconcileBatch {
        let mut batch = ReconcileBatch::default();
        let mut rolled = 0usize;

        for schedule in schedules {
            let tenancy_id = schedule.tenancy_id;
            let unchanged = schedule.clone();
            match self.reconcile(schedule, today).await {
                Ok(Reconciled { schedule, status }) => {
                    match status {
                        ReconcileStatus::Current => {}
                        ReconcileStatus::RolledForward { .. } => rolled += 1,
                        ReconcileStatus::PersistenceFailed { error, .. } => {
                            batch.failures.push((tenancy_id, error));
                        }
                    }
                    batch.schedules.push(schedule);
                }
                Err(e) => {
                    batch.failures.push((tenancy_id, e));
                    batch.schedules.push(unchanged);
                }
            }
        }

        if rolled > 0 {
            info!(
                rolled_forward = rolled,
                failures = batch.failures.len(),
                "Reconciled rent schedules"
            );
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    use db::models::tenancy::ScheduleType;

    use super::*;

    /// In-memory store that counts writes and can be told to fail them
    #[derive(Default)]
    struct FakeStore {
        pub schedules: Mutex<HashMap<Uuid, RentSchedule>>,
        pub writes: AtomicUsize,
        pub fail_writes: AtomicBool,
    }

    impl FakeStore {
        pub fn with(schedules: &[RentSchedule]) -> Self {
            let store = Self::default();
            {
                let mut map = store.schedules.lock().unwrap();
                for schedule in schedules {
                    map.insert(schedule.tenancy_id, schedule.clone());
                }
            }
            store
        }

        pub fn stored_due_date(&self, tenancy_id: Uuid) -> Option<NaiveDate> {
            self.schedules
                .lock()
                .unwrap()
                .get(&tenancy_id)
                .and_then(|s| s.due_date)
        }
    }

    #[async_trait]
    impl ScheduleStore for FakeStore {
        async fn load_schedule(
            &self,
            tenancy_id: Uuid,
        ) -> Result<Option<RentSchedule>, sqlx::Error> {
            Ok(self.schedules.lock().unwrap().get(&tenancy_id).cloned())
        }

        async fn save_due_date(
            &self,
            tenancy_id: Uuid,
            due_date: NaiveDate,
        ) -> Result<(), sqlx::Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(sqlx::Error::Protocol("disk I/O error".to_string()));
            }
            if let Some(schedule) = self.schedules.lock().unwrap().get_mut(&tenancy_id) {
                schedule.due_date = Some(due_date);
            }
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly(day: i64, due_date: Option<NaiveDate>) -> RentSchedule {
        RentSchedule {
            tenancy_id: Uuid::new_v4(),
            schedule_type: ScheduleType::Monthly,
            schedule_value: Some(day),
            due_date,
        }
    }

    #[tokio::test]
    async fn test_current_due_date_passes_through() {
        let schedule = monthly(20, Some(date(2024, 3, 20)));
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[schedule.clone()]));

        for today in [date(2024, 3, 1), date(2024, 3, 20)] {
            let reconciled = reconciler.reconcile(schedule.clone(), today).await.unwrap();
            assert_eq!(reconciled.schedule, schedule);
            assert!(!reconciled.was_rolled_forward());
        }
        assert_eq!(reconciler.store().writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lapsed_due_date_rolls_forward_with_one_write() {
        let schedule = monthly(31, Some(date(2024, 1, 31)));
        let id = schedule.tenancy_id;
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[schedule.clone()]));
        let today = date(2024, 2, 15);

        let reconciled = reconciler.reconcile(schedule, today).await.unwrap();

        let expected = due_date::next_due_date(
            Some(date(2024, 1, 31)),
            ScheduleType::Monthly,
            Some(31),
            today,
        )
        .unwrap();
        assert_eq!(expected, date(2024, 2, 29));
        assert_eq!(reconciled.schedule.due_date, Some(expected));
        assert!(matches!(
            reconciled.status,
            ReconcileStatus::RolledForward { previous: Some(p) } if p == date(2024, 1, 31)
        ));
        assert_eq!(reconciler.store().writes.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.store().stored_due_date(id), Some(expected));
    }

    #[tokio::test]
    async fn test_missing_due_date_is_computed() {
        let schedule = RentSchedule {
            tenancy_id: Uuid::new_v4(),
            schedule_type: ScheduleType::LastFridayOfMonth,
            schedule_value: None,
            due_date: None,
        };
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[schedule.clone()]));

        let reconciled = reconciler.reconcile(schedule, date(2024, 3, 1)).await.unwrap();
        assert_eq!(reconciled.schedule.due_date, Some(date(2024, 3, 29)));
        assert!(matches!(
            reconciled.status,
            ReconcileStatus::RolledForward { previous: None }
        ));
        assert_eq!(reconciler.store().writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_fresh_date() {
        let schedule = monthly(5, Some(date(2024, 2, 5)));
        let store = FakeStore::with(&[schedule.clone()]);
        store.fail_writes.store(true, Ordering::SeqCst);
        let reconciler = ScheduleReconciler::new(store);

        let reconciled = reconciler.reconcile(schedule.clone(), date(2024, 3, 10)).await.unwrap();

        assert_eq!(reconciled.schedule.due_date, Some(date(2024, 4, 5)));
        assert!(reconciled.was_rolled_forward());
        assert!(matches!(
            reconciled.persistence_error(),
            Some(ReconcileError::Persistence(_))
        ));
        assert_eq!(
            reconciler.store().stored_due_date(schedule.tenancy_id),
            Some(date(2024, 2, 5))
        );
    }

    #[tokio::test]
    async fn test_invalid_stored_schedule_is_an_error() {
        let schedule = RentSchedule {
            tenancy_id: Uuid::new_v4(),
            schedule_type: ScheduleType::Weekly,
            schedule_value: Some(12),
            due_date: None,
        };
        let reconciler = ScheduleReconciler::new(FakeStore::default());

        let err = reconciler.reconcile(schedule, date(2024, 3, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Schedule(ScheduleError::InvalidScheduleValue { .. })
        ));
        assert_eq!(reconciler.store().writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reconcile_by_id() {
        let schedule = monthly(1, Some(date(2024, 1, 1)));
        let id = schedule.tenancy_id;
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[schedule]));

        let reconciled = reconciler
            .reconcile_by_id(id, date(2024, 3, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reconciled.schedule.due_date, Some(date(2024, 4, 1)));

        let missing = reconciler
            .reconcile_by_id(Uuid::new_v4(), date(2024, 3, 2))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_all_keeps_order_and_reports_failures() {
        let current = monthly(20, Some(date(2024, 3, 20)));
        let lapsed = monthly(1, Some(date(2024, 2, 1)));
        let invalid = RentSchedule {
            tenancy_id: Uuid::new_v4(),
            schedule_type: ScheduleType::Monthly,
            schedule_value: Some(0),
            due_date: Some(date(2024, 1, 1)),
        };
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[
            current.clone(),
            lapsed.clone(),
            invalid.clone(),
        ]));

        let batch = reconciler
            .reconcile_all(
                vec![current.clone(), lapsed.clone(), invalid.clone()],
                date(2024, 3, 10),
            )
            .await;

        assert!(!batch.is_clean());
        assert_eq!(batch.schedules.len(), 3);
        assert_eq!(batch.schedules[0], current);
        assert_eq!(batch.schedules[1].due_date, Some(date(2024, 4, 1)));
        assert_eq!(batch.schedules[2], invalid);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].0, invalid.tenancy_id);
        assert_eq!(reconciler.store().writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reconciliations_agree() {
        let schedule = monthly(15, Some(date(2024, 1, 15)));
        let id = schedule.tenancy_id;
        let reconciler = ScheduleReconciler::new(FakeStore::with(&[schedule.clone()]));
        let today = date(2024, 3, 16);

        let (a, b) = tokio::join!(
            reconciler.reconcile(schedule.clone(), today),
            reconciler.reconcile(schedule, today)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.schedule.due_date, b.schedule.due_date);
        assert_eq!(reconciler.store().stored_due_date(id), Some(date(2024, 4, 15)));
    }

    #[tokio::test]
    async fn test_db_store_round_trip() {
        use db::models::tenancy::CreateTenancy;

        let db = DBService::new_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        Tenancy::create(
            &db.pool,
            id,
            &CreateTenancy {
                landlord_id: Uuid::new_v4(),
                tenant_id: None,
                property_name: "Flat 3".to_string(),
                rent_amount_cents: 90_000,
                schedule_type: "monthly".to_string(),
                schedule_value: Some(31),
            },
            ScheduleType::Monthly,
            date(2024, 1, 31),
        )
        .await
        .unwrap();

        let reconciler = ScheduleReconciler::new(db.clone());
        let reconciled = reconciler
            .reconcile_by_id(id, date(2024, 2, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reconciled.schedule.due_date, Some(date(2024, 2, 29)));
        assert!(reconciled.persistence_error().is_none());

        let stored = Tenancy::find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert_eq!(stored.due_date, Some(date(2024, 2, 29)));

        let err = db.save_due_date(Uuid::new_v4(), date(2024, 3, 1)).await.unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }
}
