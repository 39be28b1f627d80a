//! Recurring rent due date computation.
//!
//! Everything here is a pure function of its inputs. "Today" is always passed in
//! by the caller, and every value is a calendar date with no time-of-day.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use db::models::tenancy::ScheduleType;
use thiserror::Error;
use utils::calendar::{clamped_date, last_weekday_of_month, next_month, weekday_from_sunday_index};

/// Biweekly schedules alternate relative to the first matching weekday on or after this date.
const BIWEEKLY_EPOCH: (i32, u32, u32) = (2024, 1, 1);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid schedule value {value:?} for {schedule_type} schedule")]
    InvalidScheduleValue {
        schedule_type: ScheduleType,
        value: Option<i64>,
    },
    #[error("unknown schedule type: {0}")]
    UnknownScheduleType(String),
    #[error("date out of supported calendar range")]
    DateOutOfRange,
}

impl ScheduleError {
    /// True for errors caused by a malformed schedule rather than calendar limits
    pub fn is_invalid_schedule(&self) -> bool {
        matches!(
            self,
            ScheduleError::InvalidScheduleValue { .. } | ScheduleError::UnknownScheduleType(_)
        )
    }
}

/// A validated rent schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Day of month, 1-31, rounded down in shorter months
    Monthly { day: u32 },
    Weekly(Weekday),
    Biweekly(Weekday),
    LastFridayOfMonth,
}

impl Schedule {
    /// Validate a stored or submitted `(type, value)` pair
    pub fn new(schedule_type: ScheduleType, value: Option<i64>) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidScheduleValue {
            schedule_type,
            value,
        };

        match schedule_type {
            ScheduleType::Monthly => match value {
                Some(day @ 1..=31) => Ok(Schedule::Monthly { day: day as u32 }),
                _ => Err(invalid()),
            },
            ScheduleType::Weekly => value
                .and_then(weekday_from_sunday_index)
                .map(Schedule::Weekly)
                .ok_or_else(invalid),
            ScheduleType::Biweekly => value
                .and_then(weekday_from_sunday_index)
                .map(Schedule::Biweekly)
                .ok_or_else(invalid),
            // Any supplied value is ignored
            ScheduleType::LastFridayOfMonth => Ok(Schedule::LastFridayOfMonth),
        }
    }

    /// Parse the schedule type name as submitted by a client, then validate the value
    pub fn parse(schedule_type: &str, value: Option<i64>) -> Result<Self, ScheduleError> {
        let schedule_type = ScheduleType::from_str(schedule_type)
            .map_err(|_| ScheduleError::UnknownScheduleType(schedule_type.to_string()))?;
        Self::new(schedule_type, value)
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            Schedule::Monthly { .. } => ScheduleType::Monthly,
            Schedule::Weekly(_) => ScheduleType::Weekly,
            Schedule::Biweekly(_) => ScheduleType::Biweekly,
            Schedule::LastFridayOfMonth => ScheduleType::LastFridayOfMonth,
        }
    }

    /// Value as stored alongside the schedule type
    pub fn schedule_value(&self) -> Option<i64> {
        match self {
            Schedule::Monthly { day } => Some(i64::from(*day)),
            Schedule::Weekly(weekday) | Schedule::Biweekly(weekday) => {
                Some(i64::from(weekday.num_days_from_sunday()))
            }
            Schedule::LastFridayOfMonth => None,
        }
    }

    /// Next occurrence on or after `today`.
    ///
    /// Only monthly schedules carry state forward from `previous`; the weekday
    /// based schedules are fully determined by `today`.
    pub fn next_due_date(
        &self,
        previous: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<NaiveDate, ScheduleError> {
        match *self {
            Schedule::Monthly { day } => next_monthly(previous.unwrap_or(today), day, today),
            Schedule::Weekly(weekday) => next_weekly(weekday, today),
            Schedule::Biweekly(weekday) => next_biweekly(weekday, today),
            Schedule::LastFridayOfMonth => next_last_friday(today),
        }
    }

    /// Successive occurrences starting with the first one on or after `from`
    pub fn occurrences(&self, from: NaiveDate) -> Occurrences {
        Occurrences {
            schedule: *self,
            previous: None,
            from: Some(from),
        }
    }
}

/// Next due date from raw schedule columns.
///
/// Fails with [`ScheduleError::InvalidScheduleValue`] when `value` is out of range
/// for `schedule_type`.
pub fn next_due_date(
    previous: Option<NaiveDate>,
    schedule_type: ScheduleType,
    value: Option<i64>,
    today: NaiveDate,
) -> Result<NaiveDate, ScheduleError> {
    Schedule::new(schedule_type, value)?.next_due_date(previous, today)
}

fn next_monthly(start: NaiveDate, day: u32, today: NaiveDate) -> Result<NaiveDate, ScheduleError> {
    // Months before today's month can never produce a date on or after today
    let (mut year, mut month) = (start.year(), start.month()).max((today.year(), today.month()));

    loop {
        let candidate = clamped_date(year, month, day).ok_or(ScheduleError::DateOutOfRange)?;
        if candidate >= today {
            return Ok(candidate);
        }
        (year, month) = next_month(year, month);
    }
}

fn next_weekly(weekday: Weekday, today: NaiveDate) -> Result<NaiveDate, ScheduleError> {
    let ahead = (weekday.num_days_from_sunday() + 7 - today.weekday().num_days_from_sunday()) % 7;
    today
        .checked_add_days(Days::new(u64::from(ahead)))
        .ok_or(ScheduleError::DateOutOfRange)
}

fn biweekly_anchor(weekday: Weekday) -> Result<NaiveDate, ScheduleError> {
    let (year, month, day) = BIWEEKLY_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(year, month, day).ok_or(ScheduleError::DateOutOfRange)?;
    next_weekly(weekday, epoch)
}

fn next_biweekly(weekday: Weekday, today: NaiveDate) -> Result<NaiveDate, ScheduleError> {
    let anchor = biweekly_anchor(weekday)?;
    let elapsed = today.signed_duration_since(anchor).num_days();
    // Smallest whole number of fortnights that lands on or after today
    let fortnights = (elapsed + 13).div_euclid(14);
    anchor
        .checked_add_signed(chrono::Duration::days(fortnights * 14))
        .ok_or(ScheduleError::DateOutOfRange)
}

fn next_last_friday(today: NaiveDate) -> Result<NaiveDate, ScheduleError> {
    let this_month = last_weekday_of_month(today.year(), today.month(), Weekday::Fri)
        .ok_or(ScheduleError::DateOutOfRange)?;
    if this_month >= today {
        return Ok(this_month);
    }
    let (year, month) = next_month(today.year(), today.month());
    last_weekday_of_month(year, month, Weekday::Fri).ok_or(ScheduleError::DateOutOfRange)
}

/// Iterator over a schedule's occurrences, see [`Schedule::occurrences`]
#[derive(Debug, Clone)]
pub struct Occurrences {
    schedule: Schedule,
    previous: Option<NaiveDate>,
    from: Option<NaiveDate>,
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let from = self.from?;
        let next = self.schedule.next_due_date(self.previous, from).ok()?;
        self.previous = Some(next);
        self.from = next.succ_opt();
        Some(next)
    }
}
