//! Inclusive calendar date ranges and lenient date parsing.

use super::provider::DataError;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive `[start, end]` calendar range.
///
/// `start <= end` is not enforced; providers may reject inverted ranges and
/// the chunk planner yields nothing for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Build a range from two date-like strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, DataError> {
        Ok(Self::new(parse_date(start)?, parse_date(end)?))
    }

    /// Calendar days between start and end (zero for a single-day range).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Parse a date-like string.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYYMMDD`, and RFC 3339 timestamps
/// (the date part is kept).
pub fn parse_date(s: &str) -> Result<NaiveDate, DataError> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|_| DataError::InvalidDate(s.to_string()))
}
