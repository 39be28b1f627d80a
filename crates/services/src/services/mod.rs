pub mod due_date;
pub mod schedule_reconciler;
pub mod tenancy;
