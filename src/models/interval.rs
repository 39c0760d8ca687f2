use serde::{Deserialize, Serialize};
use chrono::{Days, Months, NaiveDate};
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl std::fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalUnit::Day => write!(f, "day"),
            IntervalUnit::Week => write!(f, "week"),
            IntervalUnit::Month => write!(f, "month"),
            IntervalUnit::Year => write!(f, "year"),
        }
    }
}

/// How often a subscription comes due, e.g. "2 weeks" or "1 month".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Interval {
    #[validate(range(min = 1, message = "Interval length must be at least 1"))]
    pub length: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    pub fn new(length: u32, unit: IntervalUnit) -> Self {
        Self { length, unit }
    }

    pub fn days(length: u32) -> Self {
        Self::new(length, IntervalUnit::Day)
    }

    pub fn weeks(length: u32) -> Self {
        Self::new(length, IntervalUnit::Week)
    }

    pub fn months(length: u32) -> Self {
        Self::new(length, IntervalUnit::Month)
    }

    pub fn years(length: u32) -> Self {
        Self::new(length, IntervalUnit::Year)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.length == 1 {
            write!(f, "1 {}", self.unit)
        } else {
            write!(f, "{} {}s", self.length, self.unit)
        }
    }
}

/// Adds `interval` to `current_date` using calendar arithmetic.
///
/// Month and year steps keep the day of month where possible and otherwise
/// clamp to the last day of the target month, so Jan 31 + 1 month is Feb 28
/// (Feb 29 in a leap year). Results past the representable range saturate to
/// `NaiveDate::MAX`.
pub fn next_actionable_date(current_date: NaiveDate, interval: Interval) -> NaiveDate {
    let length = u64::from(interval.length);

    let next = match interval.unit {
        IntervalUnit::Day => current_date.checked_add_days(Days::new(length)),
        IntervalUnit::Week => current_date.checked_add_days(Days::new(length * 7)),
        IntervalUnit::Month => add_months(current_date, length),
        IntervalUnit::Year => add_months(current_date, length * 12),
    };

    next.unwrap_or(NaiveDate::MAX)
}

fn add_months(date: NaiveDate, months: u64) -> Option<NaiveDate> {
    let months = u32::try_from(months).ok()?;
    date.checked_add_months(Months::new(months))
}
