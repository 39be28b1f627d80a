//! Landlord and tenant facing operations on tenancies.
//!
//! Every read goes through the schedule reconciler so due dates handed to callers
//! are never in the past.

use chrono::NaiveDate;
use db::{
    DBService,
    models::tenancy::{CreateTenancy, Tenancy, UpdateSchedule},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    due_date::{Schedule, ScheduleError},
    schedule_reconciler::{ReconcileError, ScheduleReconciler},
};

/// Upper bound on how many upcoming occurrences a single request may ask for
pub const MAX_UPCOMING: usize = 24;

#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("tenancy not found")]
    NotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ReconcileError> for TenancyError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Schedule(e) => TenancyError::Schedule(e),
            ReconcileError::Persistence(e) | ReconcileError::Database(e) => {
                TenancyError::Database(e)
            }
        }
    }
}

/// Upcoming due dates for one tenancy
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpcomingDueDates {
    pub tenancy_id: Uuid,
    pub due_dates: Vec<NaiveDate>,
}

pub struct TenancyService {
    db: DBService,
    reconciler: ScheduleReconciler<DBService>,
}

impl TenancyService {
    pub fn new(db: DBService) -> Self {
        let reconciler = ScheduleReconciler::new(db.clone());
        Self { db, reconciler }
    }

    /// Establish a tenancy with its first due date computed from scratch
    pub async fn create(
        &self,
        data: CreateTenancy,
        today: NaiveDate,
    ) -> Result<Tenancy, TenancyError> {
        validate_details(&data.property_name, data.rent_amount_cents)?;
        let schedule = Schedule::parse(&data.schedule_type, data.schedule_value)?;
        let due_date = schedule.next_due_date(None, today)?;

        let data = CreateTenancy {
            schedule_value: schedule.schedule_value(),
            ..data
        };
        let id = Uuid::new_v4();
        let tenancy =
            Tenancy::create(&self.db.pool, id, &data, schedule.schedule_type(), due_date).await?;

        info!(
            tenancy_id = %id,
            landlord_id = %tenancy.landlord_id,
            schedule_type = %tenancy.schedule_type,
            due_date = %due_date,
            "Created tenancy"
        );

        Ok(tenancy)
    }

    /// Replace the schedule; the old due date is discarded and recomputed
    pub async fn update_schedule(
        &self,
        id: Uuid,
        data: UpdateSchedule,
        today: NaiveDate,
    ) -> Result<Tenancy, TenancyError> {
        let schedule = Schedule::parse(&data.schedule_type, data.schedule_value)?;
        let due_date = schedule.next_due_date(None, today)?;

        let tenancy = Tenancy::update_schedule(
            &self.db.pool,
            id,
            schedule.schedule_type(),
            schedule.schedule_value(),
            due_date,
        )
        .await?
        .ok_or(TenancyError::NotFound)?;

        info!(
            tenancy_id = %id,
            schedule_type = %tenancy.schedule_type,
            due_date = %due_date,
            "Updated rent schedule"
        );

        Ok(tenancy)
    }

    pub async fn get(&self, id: Uuid, today: NaiveDate) -> Result<Tenancy, TenancyError> {
        let tenancy = Tenancy::find_by_id(&self.db.pool, id)
            .await?
            .ok_or(TenancyError::NotFound)?;
        let mut reconciled = self.reconcile(vec![tenancy], today).await;
        reconciled.pop().ok_or(TenancyError::NotFound)
    }

    pub async fn list_for_landlord(
        &self,
        landlord_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Tenancy>, TenancyError> {
        let tenancies = Tenancy::find_by_landlord_id(&self.db.pool, landlord_id).await?;
        Ok(self.reconcile(tenancies, today).await)
    }

    pub async fn list_for_tenant(
        &self,
        tenant_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Tenancy>, TenancyError> {
        let tenancies = Tenancy::find_by_tenant_id(&self.db.pool, tenant_id).await?;
        Ok(self.reconcile(tenancies, today).await)
    }

    /// The next `count` due dates, starting with the reconciled current one
    pub async fn upcoming(
        &self,
        id: Uuid,
        count: usize,
        today: NaiveDate,
    ) -> Result<UpcomingDueDates, TenancyError> {
        if count == 0 || count > MAX_UPCOMING {
            return Err(TenancyError::InvalidInput(format!(
                "count must be between 1 and {MAX_UPCOMING}"
            )));
        }

        let reconciled = self
            .reconciler
            .reconcile_by_id(id, today)
            .await?
            .ok_or(TenancyError::NotFound)?;
        if let Some(e) = reconciled.persistence_error() {
            warn!(tenancy_id = %id, error = %e, "{}", failure_message(e));
        }

        let rent = reconciled.schedule;
        let schedule = Schedule::new(rent.schedule_type, rent.schedule_value)?;
        let from = rent.due_date.unwrap_or(today);
        let due_dates: Vec<NaiveDate> = schedule.occurrences(from).take(count).collect();

        Ok(UpcomingDueDates {
            tenancy_id: id,
            due_dates,
        })
    }

    /// End a tenancy
    pub async fn delete(&self, id: Uuid) -> Result<(), TenancyError> {
        let rows = Tenancy::delete(&self.db.pool, id).await?;
        if rows == 0 {
            return Err(TenancyError::NotFound);
        }
        info!(tenancy_id = %id, "Deleted tenancy");
        Ok(())
    }

    /// Roll every record's due date forward before it leaves the service.
    ///
    /// Failures are logged here and only here; callers still receive the fresh
    /// dates, or the stored ones for a schedule that fails validation.
    async fn reconcile(&self, mut tenancies: Vec<Tenancy>, today: NaiveDate) -> Vec<Tenancy> {
        let schedules = tenancies.iter().map(Tenancy::rent_schedule).collect();
        let batch = self.reconciler.reconcile_all(schedules, today).await;

        for (tenancy_id, e) in &batch.failures {
            warn!(tenancy_id = %tenancy_id, error = %e, "{}", failure_message(e));
        }

        for (tenancy, schedule) in tenancies.iter_mut().zip(&batch.schedules) {
            tenancy.apply_schedule(schedule);
        }
        tenancies
    }
}

fn failure_message(err: &ReconcileError) -> &'static str {
    match err {
        ReconcileError::Schedule(_) => "Stored rent schedule is invalid; due date left as stored",
        ReconcileError::Persistence(_) => "Due date reconciliation not persisted",
        ReconcileError::Database(_) => "Failed to load rent schedule",
    }
}

fn validate_details(property_name: &str, rent_amount_cents: i64) -> Result<(), TenancyError> {
    if property_name.trim().is_empty() {
        return Err(TenancyError::InvalidInput(
            "property name must not be empty".to_string(),
        ));
    }
    if rent_amount_cents < 0 {
        return Err(TenancyError::InvalidInput(
            "rent amount must not be negative".to_string(),
        ));
    }
    Ok(())
}
