//! Date scoping and shared enums for ledger primitives.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Whether money flows in or out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Income, Direction::Expense];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::Income => "Income",
            Direction::Expense => "Expense",
        };
        f.write_str(label)
    }
}

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// First through last day of the month containing `date`.
    pub fn month_containing(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.day0()));
        let end = start + Duration::days(i64::from(days_in_month(date.year(), date.month())) - 1);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`DateRange`] or [`DateScope`] values.
pub enum DateRangeError {
    InvalidRange,
    InvalidMonth,
}

impl fmt::Display for DateRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRangeError::InvalidRange => f.write_str("date range end must not precede start"),
            DateRangeError::InvalidMonth => f.write_str("month must be between 1 and 12"),
        }
    }
}

impl std::error::Error for DateRangeError {}

/// Read scope for ledger queries: a single day, a calendar month, or everything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DateScope {
    #[default]
    Unscoped,
    Day { date: NaiveDate },
    Month { year: i32, month: u32 },
}

impl DateScope {
    pub fn month(year: i32, month: u32) -> Result<Self, DateRangeError> {
        if !(1..=12).contains(&month) {
            return Err(DateRangeError::InvalidMonth);
        }
        Ok(DateScope::Month { year, month })
    }

    pub fn month_of(date: NaiveDate) -> Self {
        DateScope::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Resolves the scope into a concrete range; `None` means unbounded.
    pub fn range(&self) -> Option<DateRange> {
        match *self {
            DateScope::Unscoped => None,
            DateScope::Day { date } => Some(DateRange::day(date)),
            DateScope::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1)
                .map(DateRange::month_containing),
        }
    }
}

impl fmt::Display for DateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateScope::Unscoped => f.write_str("all time"),
            DateScope::Day { date } => write!(f, "{date}"),
            DateScope::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };
    match (
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
        NaiveDate::from_ymd_opt(year, month, 1),
    ) {
        (Some(first_next), Some(first)) => (first_next - first).num_days() as u32,
        _ => 28,
    }
}
