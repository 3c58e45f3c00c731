//! History provider trait, row type, request options and structured error types.
//!
//! The HistoryProvider trait abstracts over data sources (Yahoo Finance, a
//! directory of CSV files) so the fallback pipeline can be driven by any of
//! them and mocked for tests.

use super::range::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// One timestamped row returned by a provider.
///
/// Fields are addressed by name. A field missing from `values` means the
/// provider does not publish that measure for the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

impl HistoryRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }
}

/// Structured error types for provider and pipeline operations.
///
/// These are displayable in CLI output and carried as plain reasons in
/// diagnostics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("HTTP {status} for {symbol}")]
    Http { status: u16, symbol: String },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Bar granularity requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "1d",
        }
    }
}

/// Options attached to a range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    pub granularity: Granularity,
    /// Adjust prices for dividends and splits.
    pub adjusted: bool,
    /// Include pre-market and after-hours data.
    pub include_extended_hours: bool,
    /// Hint that the provider may parallelize the request internally.
    /// Providers without such a facility ignore it.
    pub concurrency_hint: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Daily,
            adjusted: true,
            include_extended_hours: false,
            concurrency_hint: false,
        }
    }
}

impl FetchOptions {
    /// Options for the single whole-range request: daily, adjusted,
    /// extended hours included, concurrency hint on.
    pub fn direct() -> Self {
        Self {
            include_extended_hours: true,
            concurrency_hint: true,
            ..Self::default()
        }
    }
}

/// Coarse historical window understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodBucket {
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl PeriodBucket {
    /// Map a calendar-day duration to the smallest bucket that covers it.
    ///
    /// More than five years maps to `max`, more than two to `5y`, more than
    /// one to `2y`, anything else to `1y`.
    pub fn for_days(days: i64) -> Self {
        if days > 365 * 5 {
            PeriodBucket::Max
        } else if days > 365 * 2 {
            PeriodBucket::FiveYears
        } else if days > 365 {
            PeriodBucket::TwoYears
        } else {
            PeriodBucket::OneYear
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodBucket::OneYear => "1y",
            PeriodBucket::TwoYears => "2y",
            PeriodBucket::FiveYears => "5y",
            PeriodBucket::Max => "max",
        }
    }

    /// Window length in calendar days, `None` for unbounded.
    pub fn span_days(&self) -> Option<i64> {
        match self {
            PeriodBucket::OneYear => Some(365),
            PeriodBucket::TwoYears => Some(365 * 2),
            PeriodBucket::FiveYears => Some(365 * 5),
            PeriodBucket::Max => None,
        }
    }
}

impl fmt::Display for PeriodBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for history providers (Yahoo Finance, CSV directory, test stubs).
///
/// Implementations handle the specifics of one source. Fallback, chunking and
/// pacing sit above this trait; providers make exactly one request per call.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch rows for an identifier over an inclusive date range.
    ///
    /// A successful call may return zero rows when the range holds no
    /// trading days.
    fn fetch_range(
        &self,
        identifier: &str,
        range: DateRange,
        options: &FetchOptions,
    ) -> Result<Vec<HistoryRow>, DataError>;

    /// Fetch rows for an identifier over a coarse trailing window.
    fn fetch_period(
        &self,
        identifier: &str,
        period: PeriodBucket,
    ) -> Result<Vec<HistoryRow>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_thresholds() {
        assert_eq!(PeriodBucket::for_days(0), PeriodBucket::OneYear);
        assert_eq!(PeriodBucket::for_days(365), PeriodBucket::OneYear);
        assert_eq!(PeriodBucket::for_days(366), PeriodBucket::TwoYears);
        assert_eq!(PeriodBucket::for_days(730), PeriodBucket::TwoYears);
        assert_eq!(PeriodBucket::for_days(731), PeriodBucket::FiveYears);
        assert_eq!(PeriodBucket::for_days(1825), PeriodBucket::FiveYears);
        assert_eq!(PeriodBucket::for_days(1826), PeriodBucket::Max);
    }

    #[test]
    fn direct_options_include_extended_hours() {
        let opts = FetchOptions::direct();
        assert!(opts.adjusted);
        assert!(opts.include_extended_hours);
        assert!(opts.concurrency_hint);
        assert_eq!(opts.granularity.as_str(), "1d");

        let plain = FetchOptions::default();
        assert!(!plain.include_extended_hours);
    }

    #[test]
    fn row_field_access() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let row = HistoryRow::new(date).with("close", 101.5).with("volume", 1e6);
        assert_eq!(row.get("close"), Some(101.5));
        assert!(row.get("open").is_none());
        assert!(row.has_field("volume"));
        assert_eq!(row.field_names().collect::<Vec<_>>(), vec!["close", "volume"]);
    }
}
