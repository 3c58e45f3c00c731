//! Offline provider backed by a directory of per-identifier CSV files.
//!
//! Layout: `{dir}/{IDENTIFIER}.csv`, one header row with a `date` column and
//! any number of numeric columns. Every non-date column becomes a field.

use super::provider::{DataError, FetchOptions, HistoryProvider, HistoryRow, PeriodBucket};
use super::range::{parse_date, DateRange};
use chrono::TimeDelta;
use std::path::{Path, PathBuf};

pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, identifier: &str) -> Result<PathBuf, DataError> {
        if identifier.is_empty()
            || identifier.contains(['/', '\\'])
            || identifier.starts_with('.')
        {
            return Err(DataError::SymbolNotFound {
                symbol: identifier.to_string(),
            });
        }
        Ok(self.dir.join(format!("{identifier}.csv")))
    }

    /// All rows for an identifier, sorted by date.
    fn load(&self, identifier: &str) -> Result<Vec<HistoryRow>, DataError> {
        let path = self.path_for(identifier)?;
        if !path.exists() {
            return Err(DataError::SymbolNotFound {
                symbol: identifier.to_string(),
            });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;
        let headers = reader
            .headers()
            .map_err(|e| DataError::Csv(e.to_string()))?
            .clone();
        let date_col = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("date"))
            .ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("{}: no date column", path.display()))
            })?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| DataError::Csv(e.to_string()))?;
            let date = parse_date(record.get(date_col).unwrap_or_default())?;
            let mut row = HistoryRow::new(date);
            for (i, header) in headers.iter().enumerate() {
                if i == date_col {
                    continue;
                }
                let value = record
                    .get(i)
                    .and_then(|cell| cell.trim().parse::<f64>().ok())
                    .unwrap_or(f64::NAN);
                row.values.insert(header.trim().to_string(), value);
            }
            rows.push(row);
        }

        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }
}

impl HistoryProvider for CsvDirProvider {
    fn name(&self) -> &str {
        "csv_dir"
    }

    fn fetch_range(
        &self,
        identifier: &str,
        range: DateRange,
        _options: &FetchOptions,
    ) -> Result<Vec<HistoryRow>, DataError> {
        Ok(self
            .load(identifier)?
            .into_iter()
            .filter(|r| range.contains(r.date))
            .collect())
    }

    /// Trailing window counted back from the latest row on file.
    fn fetch_period(
        &self,
        identifier: &str,
        period: PeriodBucket,
    ) -> Result<Vec<HistoryRow>, DataError> {
        let rows = self.load(identifier)?;
        let (Some(span), Some(last)) = (period.span_days(), rows.last().map(|r| r.date)) else {
            return Ok(rows);
        };
        let cutoff = last - TimeDelta::days(span);
        Ok(rows.into_iter().filter(|r| r.date >= cutoff).collect())
    }
}
