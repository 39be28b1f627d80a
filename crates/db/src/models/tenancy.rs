use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Recurrence pattern governing when rent is due
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "schedule_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleType {
    /// Value is the day of month, 1-31
    Monthly,
    /// Value is the weekday, 0 (Sunday) - 6 (Saturday)
    Weekly,
    /// Value is the weekday, 0 (Sunday) - 6 (Saturday)
    Biweekly,
    /// Carries no value
    LastFridayOfMonth,
}

/// Schedule and last computed due date embedded in a tenancy
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct RentSchedule {
    pub tenancy_id: Uuid,
    pub schedule_type: ScheduleType,
    pub schedule_value: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Tenancy {
    pub id: Uuid,
    pub landlord_id: Uuid,
    pub tenant_id: Option<Uuid>, // Unset until a tenant accepts the invite
    pub property_name: String,
    pub rent_amount_cents: i64,
    pub schedule_type: ScheduleType,
    pub schedule_value: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenancy {
    pub fn rent_schedule(&self) -> RentSchedule {
        RentSchedule {
            tenancy_id: self.id,
            schedule_type: self.schedule_type,
            schedule_value: self.schedule_value,
            due_date: self.due_date,
        }
    }

    /// Copy a reconciled due date back onto this record
    pub fn apply_schedule(&mut self, schedule: &RentSchedule) {
        debug_assert_eq!(self.id, schedule.tenancy_id);
        self.due_date = schedule.due_date;
    }
}

/// Request body for establishing a tenancy
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTenancy {
    pub landlord_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub property_name: String,
    pub rent_amount_cents: i64,
    pub schedule_type: String,
    pub schedule_value: Option<i64>,
}

/// Request body for a landlord editing the rent schedule
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateSchedule {
    pub schedule_type: String,
    pub schedule_value: Option<i64>,
}

impl Tenancy {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        data: &CreateTenancy,
        schedule_type: ScheduleType,
        due_date: NaiveDate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tenancy>(
            r#"
            INSERT INTO tenancies
                (id, landlord_id, tenant_id, property_name, rent_amount_cents,
                 schedule_type, schedule_value, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id,
                landlord_id,
                tenant_id,
                property_name,
                rent_amount_cents,
                schedule_type,
                schedule_value,
                due_date,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(data.landlord_id)
        .bind(data.tenant_id)
        .bind(&data.property_name)
        .bind(data.rent_amount_cents)
        .bind(schedule_type)
        .bind(data.schedule_value)
        .bind(due_date)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenancy>(
            r#"
            SELECT
                id,
                landlord_id,
                tenant_id,
                property_name,
                rent_amount_cents,
                schedule_type,
                schedule_value,
                due_date,
                created_at,
                updated_at
            FROM tenancies
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_landlord_id(
        pool: &SqlitePool,
        landlord_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenancy>(
            r#"
            SELECT
                id,
                landlord_id,
                tenant_id,
                property_name,
                rent_amount_cents,
                schedule_type,
                schedule_value,
                due_date,
                created_at,
                updated_at
            FROM tenancies
            WHERE landlord_id = $1
            ORDER BY property_name ASC, created_at ASC
            "#,
        )
        .bind(landlord_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_tenant_id(
        pool: &SqlitePool,
        tenant_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenancy>(
            r#"
            SELECT
                id,
                landlord_id,
                tenant_id,
                property_name,
                rent_amount_cents,
                schedule_type,
                schedule_value,
                due_date,
                created_at,
                updated_at
            FROM tenancies
            WHERE tenant_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    /// Schedule columns only, for the reconciler's load path
    pub async fn find_schedule(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<RentSchedule>, sqlx::Error> {
        sqlx::query_as::<_, RentSchedule>(
            r#"SELECT id AS tenancy_id, schedule_type, schedule_value, due_date
            FROM tenancies
            WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Replace the schedule and its due date together
    pub async fn update_schedule(
        pool: &SqlitePool,
        id: Uuid,
        schedule_type: ScheduleType,
        schedule_value: Option<i64>,
        due_date: NaiveDate,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenancy>(
            r#"
            UPDATE tenancies
            SET schedule_type = $2,
                schedule_value = $3,
                due_date = $4,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1
            RETURNING
                id,
                landlord_id,
                tenant_id,
                property_name,
                rent_amount_cents,
                schedule_type,
                schedule_value,
                due_date,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(schedule_type)
        .bind(schedule_value)
        .bind(due_date)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_due_date(
        pool: &SqlitePool,
        id: Uuid,
        due_date: NaiveDate,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE tenancies
            SET due_date = $2,
                updated_at = datetime('now', 'subsec')
            WHERE id = $1"#,
        )
        .bind(id)
        .bind(due_date)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tenancies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
