//! Chunked range retrieval.
//!
//! Long ranges are split into bounded, contiguous sub-ranges that are fetched
//! one after another. Per-chunk failures are reported and skipped; whatever
//! came back is merged into a single date-ordered series without duplicates.

use super::diagnostics::{Diagnostic, Diagnostics};
use super::provider::{FetchOptions, HistoryProvider, HistoryRow};
use super::range::DateRange;
use chrono::TimeDelta;
use std::collections::HashSet;
use std::time::Duration;

/// Two years, in calendar days.
pub const DEFAULT_CHUNK_DAYS: i64 = 365 * 2;

/// Default pause between consecutive chunk requests.
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(100);

/// Splits ranges into chunks and fetches them sequentially.
#[derive(Debug, Clone)]
pub struct RangeChunker {
    chunk_days: i64,
    pause: Duration,
    options: FetchOptions,
}

/// What a chunked fetch produced.
#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    /// Merged, deduplicated, date-ascending rows.
    pub rows: Vec<HistoryRow>,
    /// Chunks whose request succeeded, including those with zero rows.
    pub succeeded: usize,
    pub failed: usize,
    pub last_error: Option<String>,
}

impl ChunkReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl Default for RangeChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_DAYS)
    }
}

impl RangeChunker {
    /// Chunker whose sub-ranges span at most `chunk_days` calendar days.
    pub fn new(chunk_days: i64) -> Self {
        Self {
            chunk_days: chunk_days.max(0),
            pause: DEFAULT_CHUNK_PAUSE,
            options: FetchOptions::default(),
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn chunk_days(&self) -> i64 {
        self.chunk_days
    }

    /// Contiguous, non-overlapping sub-ranges covering `range`.
    pub fn plan(&self, range: DateRange) -> Vec<DateRange> {
        plan_chunks(range, self.chunk_days)
    }

    /// Fetch every chunk of `range` and merge the results.
    ///
    /// Returns an empty vector when every chunk failed or came back empty.
    pub fn chunk_and_merge(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        diagnostics: &dyn Diagnostics,
    ) -> Vec<HistoryRow> {
        self.fetch_chunks(provider, identifier, range, diagnostics).rows
    }

    /// Like [`chunk_and_merge`](Self::chunk_and_merge) but keeps the
    /// per-chunk success and failure counts.
    pub fn fetch_chunks(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        diagnostics: &dyn Diagnostics,
    ) -> ChunkReport {
        let mut report = ChunkReport::default();
        let mut collected = Vec::new();

        for (i, chunk) in self.plan(range).into_iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }

            match provider.fetch_range(identifier, chunk, &self.options) {
                Ok(rows) => {
                    report.succeeded += 1;
                    if !rows.is_empty() {
                        collected.push(rows);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    report.last_error = Some(e.to_string());
                    diagnostics.emit(Diagnostic::ChunkFailed {
                        identifier: identifier.to_string(),
                        range: chunk,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.rows = merge_chunks(collected);
        report
    }
}

/// Split `range` into sub-ranges of at most `chunk_days` days each.
///
/// Each chunk ends at `start + chunk_days` or at the range end, whichever
/// comes first; the next chunk starts the day after. An inverted range
/// yields no chunks.
pub fn plan_chunks(range: DateRange, chunk_days: i64) -> Vec<DateRange> {
    // A span too large for `TimeDelta` covers the whole range in one chunk.
    let span = TimeDelta::try_days(chunk_days.max(0));
    let mut chunks = Vec::new();
    let mut current = range.start;

    while current <= range.end {
        let end = span
            .and_then(|span| current.checked_add_signed(span))
            .map_or(range.end, |d| d.min(range.end));
        chunks.push(DateRange::new(current, end));

        match end.succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    chunks
}

/// Concatenate chunk results, keep the first row seen for each date, and
/// sort ascending by date.
pub fn merge_chunks(chunks: Vec<Vec<HistoryRow>>) -> Vec<HistoryRow> {
    let mut seen = HashSet::new();
    let mut merged: Vec<HistoryRow> = chunks
        .into_iter()
        .flatten()
        .filter(|row| seen.insert(row.date))
        .collect();
    merged.sort_by_key(|row| row.date);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::diagnostics::RecordingDiagnostics;
    use crate::data::provider::{DataError, PeriodBucket};
    use chrono::{Datelike, NaiveDate};
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(date: NaiveDate, close: f64) -> HistoryRow {
        HistoryRow::new(date).with("close", close)
    }

    /// Returns rows on each chunk's first and last day; fails chunks starting in `fail_years`.
    struct ChunkStub {
        fail_years: Vec<i32>,
        calls: Mutex<Vec<DateRange>>,
    }

    impl HistoryProvider for ChunkStub {
        fn name(&self) -> &str {
            "chunk_stub"
        }

        fn fetch_range(
            &self,
            _identifier: &str,
            range: DateRange,
            _options: &FetchOptions,
        ) -> Result<Vec<HistoryRow>, DataError> {
            self.calls.lock().unwrap().push(range);
            if self.fail_years.contains(&range.start.year()) {
                return Err(DataError::Other("boom".into()));
            }
            Ok(vec![row(range.start, 1.0), row(range.end, 2.0)])
        }

        fn fetch_period(
            &self,
            _identifier: &str,
            _period: PeriodBucket,
        ) -> Result<Vec<HistoryRow>, DataError> {
            unreachable!("chunker never requests periods")
        }
    }

    #[test]
    fn ten_years_in_two_year_chunks_is_contiguous() {
        let range = DateRange::new(d(2010, 1, 1), d(2019, 12, 31));
        let chunks = plan_chunks(range, DEFAULT_CHUNK_DAYS);

        assert_eq!(chunks.first().unwrap().start, range.start);
        assert_eq!(chunks.last().unwrap().end, range.end);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end.succ_opt().unwrap());
        }
        for c in &chunks {
            assert!(c.days() <= DEFAULT_CHUNK_DAYS);
        }
        assert_eq!(chunks.len(), 5);
    }

    #[test]
    fn single_day_range_is_one_chunk() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 1));
        assert_eq!(plan_chunks(range, 730), vec![range]);
    }

    #[test]
    fn inverted_range_has_no_chunks() {
        let range = DateRange::new(d(2024, 3, 2), d(2024, 3, 1));
        assert!(plan_chunks(range, 730).is_empty());
    }

    #[test]
    fn oversized_span_is_one_chunk() {
        let range = DateRange::new(d(2000, 1, 1), d(2024, 12, 31));
        assert_eq!(plan_chunks(range, 200_000_000_000), vec![range]);
        assert_eq!(plan_chunks(range, i64::MAX), vec![range]);
        assert_eq!(RangeChunker::new(i64::MAX).plan(range), vec![range]);
    }

    #[test]
    fn merge_dedups_keeping_first_and_sorts() {
        let merged = merge_chunks(vec![
            vec![row(d(2024, 1, 3), 3.0), row(d(2024, 1, 4), 4.0)],
            vec![row(d(2024, 1, 2), 2.0), row(d(2024, 1, 3), 99.0)],
        ]);
        let dates: Vec<_> = merged.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)]);
        assert_eq!(merged[1].get("close"), Some(3.0));
    }

    #[test]
    fn failed_chunk_is_skipped() {
        let provider = ChunkStub {
            fail_years: vec![2012],
            calls: Mutex::new(Vec::new()),
        };
        let sink = RecordingDiagnostics::new();
        let chunker = RangeChunker::new(DEFAULT_CHUNK_DAYS).with_pause(Duration::ZERO);
        let range = DateRange::new(d(2010, 1, 1), d(2015, 12, 31));

        let report = chunker.fetch_chunks(&provider, "SPY", range, &sink);

        assert_eq!(report.attempted(), 3);
        assert_eq!(provider.calls.lock().unwrap().len(), 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 2);
        let dates: Vec<_> = report.rows.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![d(2010, 1, 1), d(2012, 1, 1), d(2014, 1, 2), d(2015, 12, 31)]
        );
        assert_eq!(
            sink.count_where(|e| matches!(e, Diagnostic::ChunkFailed { .. })),
            1
        );
        for pair in report.rows.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn all_chunks_failing_yields_empty() {
        let provider = ChunkStub {
            fail_years: (2000..2030).collect(),
            calls: Mutex::new(Vec::new()),
        };
        let chunker = RangeChunker::default().with_pause(Duration::ZERO);
        let rows = chunker.chunk_and_merge(
            &provider,
            "SPY",
            DateRange::new(d(2020, 1, 1), d(2023, 6, 30)),
            &RecordingDiagnostics::new(),
        );
        assert!(rows.is_empty());
    }
}
