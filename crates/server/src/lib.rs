use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use db::DBService;
use services::services::tenancy::TenancyService;

pub mod config;
pub mod error;
pub mod routes;

/// Source of "today" for due date calculations
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    /// Current calendar date in the configured timezone
    System(Tz),
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        self.today_at(Utc::now())
    }

    /// Calendar date for the instant `now`; fixed clocks ignore it
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Clock::System(tz) => utils::calendar::today_in(*tz, now),
            Clock::Fixed(date) => *date,
        }
    }
}

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    tenancies: Arc<TenancyService>,
    clock: Clock,
}

impl AppState {
    pub fn new(db: DBService, clock: Clock) -> Self {
        let tenancies = Arc::new(TenancyService::new(db.clone()));
        Self {
            db,
            tenancies,
            clock,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn tenancies(&self) -> &TenancyService {
        &self.tenancies
    }

    /// Read once per request and passed down explicitly
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
