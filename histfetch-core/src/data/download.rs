//! Download orchestrator: runs the fallback chain for every identifier, paces
//! requests, and collects field series into the flat store.

use super::chunker::RangeChunker;
use super::diagnostics::{Diagnostic, Diagnostics, SelectionKind};
use super::fallback::{FallbackFetcher, FetchOutcome};
use super::provider::{DataError, HistoryProvider, HistoryRow};
use super::range::DateRange;
use super::store::{FlatStore, FlatStoreBuilder, SeriesKey};
use crate::config::FetchSettings;
use std::time::Duration;

/// Drives one batch fetch.
pub struct FetchOrchestrator {
    fetcher: FallbackFetcher,
    identifier_pause: Duration,
}

impl Default for FetchOrchestrator {
    fn default() -> Self {
        Self::from_settings(&FetchSettings::default())
    }
}

impl FetchOrchestrator {
    pub fn new(fetcher: FallbackFetcher) -> Self {
        Self {
            fetcher,
            identifier_pause: FetchSettings::default().identifier_pause(),
        }
    }

    /// Standard strategy chain tuned by `settings`.
    pub fn from_settings(settings: &FetchSettings) -> Self {
        let chunker = RangeChunker::new(settings.chunk_days).with_pause(settings.chunk_pause());
        Self::new(FallbackFetcher::standard(chunker))
            .with_identifier_pause(settings.identifier_pause())
    }

    pub fn with_identifier_pause(mut self, pause: Duration) -> Self {
        self.identifier_pause = pause;
        self
    }

    pub fn fetcher(&self) -> &FallbackFetcher {
        &self.fetcher
    }

    /// Fetch every identifier and build the store.
    ///
    /// Per-identifier problems never abort the batch; they end up in the
    /// report. Only an empty identifier or field list is an error.
    pub fn build(
        &self,
        provider: &dyn HistoryProvider,
        range: DateRange,
        identifiers: &[String],
        fields: &[String],
        diagnostics: &dyn Diagnostics,
    ) -> Result<FetchReport, DataError> {
        let identifiers = normalize_entries(SelectionKind::Identifier, identifiers, diagnostics)?;
        let fields = normalize_entries(SelectionKind::Field, fields, diagnostics)?;

        let total = identifiers.len();
        let mut builder = FlatStoreBuilder::new();
        let mut failed = Vec::new();
        let mut empty = Vec::new();

        for (i, identifier) in identifiers.iter().enumerate() {
            if i > 0 && !self.identifier_pause.is_zero() {
                std::thread::sleep(self.identifier_pause);
            }
            diagnostics.emit(Diagnostic::IdentifierStarted {
                identifier: identifier.clone(),
                index: i,
                total,
            });

            match self.fetcher.fetch_one(provider, identifier, range, diagnostics) {
                FetchOutcome::Success { rows, .. } => {
                    store_fields(&mut builder, identifier, &rows, &fields, diagnostics);
                }
                FetchOutcome::Empty => {
                    diagnostics.emit(Diagnostic::IdentifierEmpty {
                        identifier: identifier.clone(),
                    });
                    empty.push(identifier.clone());
                }
                FetchOutcome::Failed { reasons } => {
                    diagnostics.emit(Diagnostic::IdentifierFailed {
                        identifier: identifier.clone(),
                        reasons,
                    });
                    failed.push(identifier.clone());
                }
            }
        }

        let report = FetchReport {
            range,
            identifiers,
            fields,
            store: builder.build(),
            failed,
            empty,
        };

        diagnostics.emit(Diagnostic::BatchComplete {
            total,
            populated: report.populated_identifiers(),
            failed: report.failed.clone(),
            empty: report.empty.clone(),
        });

        Ok(report)
    }
}

/// Copy each requested field out of `rows` into the store.
///
/// A field is present when at least one row carries it; rows without it
/// contribute `NaN` so every series stays row-aligned.
fn store_fields(
    builder: &mut FlatStoreBuilder,
    identifier: &str,
    rows: &[HistoryRow],
    fields: &[String],
    diagnostics: &dyn Diagnostics,
) {
    for field in fields {
        if !rows.iter().any(|row| row.has_field(field)) {
            diagnostics.emit(Diagnostic::FieldMissing {
                identifier: identifier.to_string(),
                field: field.clone(),
                available: available_fields(rows),
            });
            continue;
        }

        let values = rows
            .iter()
            .map(|row| row.get(field).unwrap_or(f64::NAN))
            .collect();
        builder.insert(SeriesKey::new(identifier, field.as_str()), values);
    }
}

fn available_fields(rows: &[HistoryRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        for name in row.field_names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    names
}

/// Reject an empty list and collapse duplicates to their first occurrence.
pub fn normalize_entries(
    kind: SelectionKind,
    entries: &[String],
    diagnostics: &dyn Diagnostics,
) -> Result<Vec<String>, DataError> {
    if entries.is_empty() {
        return Err(DataError::InvalidConfig(format!("no {kind} requested")));
    }

    let mut unique: Vec<String> = Vec::with_capacity(entries.len());
    let mut duplicates: Vec<String> = Vec::new();
    for entry in entries {
        if unique.contains(entry) {
            if !duplicates.contains(entry) {
                duplicates.push(entry.clone());
            }
        } else {
            unique.push(entry.clone());
        }
    }

    if !duplicates.is_empty() {
        diagnostics.emit(Diagnostic::DuplicateEntries {
            kind,
            names: duplicates,
        });
    }
    Ok(unique)
}

/// Outcome of a batch fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub range: DateRange,
    /// Requested identifiers, de-duplicated, in request order.
    pub identifiers: Vec<String>,
    /// Requested fields, de-duplicated, in request order.
    pub fields: Vec<String>,
    pub store: FlatStore,
    /// Identifiers for which every strategy errored.
    pub failed: Vec<String>,
    /// Identifiers whose provider calls succeeded with zero rows.
    pub empty: Vec<String>,
}

impl FetchReport {
    /// Populated keys divided by the number of requested fields.
    pub fn populated_identifiers(&self) -> usize {
        if self.fields.is_empty() {
            0
        } else {
            self.store.len() / self.fields.len()
        }
    }

    pub fn all_failed(&self) -> bool {
        !self.identifiers.is_empty() && self.failed.len() == self.identifiers.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.empty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::diagnostics::RecordingDiagnostics;
    use crate::data::provider::{FetchOptions, PeriodBucket};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// "BAD" always errors, "FLAT" always returns nothing, everything else
    /// gets two rows with `close` and `volume`.
    struct BatchStub;

    impl BatchStub {
        fn rows(identifier: &str, dates: [NaiveDate; 2]) -> Result<Vec<HistoryRow>, DataError> {
            match identifier {
                "BAD" => Err(DataError::SymbolNotFound {
                    symbol: identifier.into(),
                }),
                "FLAT" => Ok(Vec::new()),
                _ => Ok(dates
                    .iter()
                    .map(|&date| HistoryRow::new(date).with("close", 1.0).with("volume", 2.0))
                    .collect()),
            }
        }
    }

    impl HistoryProvider for BatchStub {
        fn name(&self) -> &str {
            "batch_stub"
        }

        fn fetch_range(
            &self,
            identifier: &str,
            range: DateRange,
            _options: &FetchOptions,
        ) -> Result<Vec<HistoryRow>, DataError> {
            Self::rows(identifier, [range.start, range.end])
        }

        fn fetch_period(
            &self,
            identifier: &str,
            _period: PeriodBucket,
        ) -> Result<Vec<HistoryRow>, DataError> {
            Self::rows(identifier, [d(2024, 1, 2), d(2024, 1, 3)])
        }
    }

    fn orchestrator() -> FetchOrchestrator {
        FetchOrchestrator::from_settings(&FetchSettings::immediate())
    }

    fn range() -> DateRange {
        DateRange::new(d(2024, 1, 1), d(2024, 3, 31))
    }

    #[test]
    fn failures_are_isolated() {
        let sink = RecordingDiagnostics::new();
        let report = orchestrator()
            .build(
                &BatchStub,
                range(),
                &strings(&["A", "BAD", "C"]),
                &strings(&["close", "volume"]),
                &sink,
            )
            .unwrap();

        let keys: Vec<String> = report.store.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["A_close", "A_volume", "C_close", "C_volume"]);
        assert_eq!(report.failed, vec!["BAD"]);
        assert_eq!(report.populated_identifiers(), 2);
        assert!(!report.all_failed());

        let batch = sink
            .events()
            .into_iter()
            .find_map(|e| match e {
                Diagnostic::BatchComplete { failed, populated, .. } => Some((failed, populated)),
                _ => None,
            })
            .unwrap();
        assert_eq!(batch, (vec!["BAD".to_string()], 2));
    }

    #[test]
    fn missing_field_is_skipped_not_fatal() {
        let sink = RecordingDiagnostics::new();
        let report = orchestrator()
            .build(
                &BatchStub,
                range(),
                &strings(&["A"]),
                &strings(&["close", "dividends"]),
                &sink,
            )
            .unwrap();

        assert_eq!(report.store.len(), 1);
        assert!(report.failed.is_empty());
        let missing: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Diagnostic::FieldMissing { field, available, .. } => Some((field, available)),
                _ => None,
            })
            .collect();
        assert_eq!(
            missing,
            vec![(
                "dividends".to_string(),
                vec!["close".to_string(), "volume".to_string()]
            )]
        );
    }

    #[test]
    fn zero_row_identifier_is_empty_not_failed() {
        let report = orchestrator()
            .build(
                &BatchStub,
                range(),
                &strings(&["FLAT", "A"]),
                &strings(&["close"]),
                &RecordingDiagnostics::new(),
            )
            .unwrap();

        assert!(report.failed.is_empty());
        assert_eq!(report.empty, vec!["FLAT"]);
        assert!(!report.store.keys().any(|k| k.identifier() == "FLAT"));
        assert!(!report.all_succeeded());
    }

    #[test]
    fn empty_field_list_is_rejected() {
        let err = orchestrator()
            .build(
                &BatchStub,
                range(),
                &strings(&["A"]),
                &[],
                &RecordingDiagnostics::new(),
            )
            .unwrap_err();
        assert!(matches!(err, DataError::InvalidConfig(_)));
    }

    #[test]
    fn duplicates_collapse_with_a_diagnostic() {
        let sink = RecordingDiagnostics::new();
        let report = orchestrator()
            .build(
                &BatchStub,
                range(),
                &strings(&["A", "A", "C"]),
                &strings(&["close"]),
                &sink,
            )
            .unwrap();

        assert_eq!(report.identifiers, vec!["A", "C"]);
        assert_eq!(report.store.len(), 2);
        assert!(sink.events().contains(&Diagnostic::DuplicateEntries {
            kind: SelectionKind::Identifier,
            names: vec!["A".into()],
        }));
    }

    #[test]
    fn sparse_field_is_padded_with_nan() {
        let rows = vec![
            HistoryRow::new(d(2024, 1, 2)).with("close", 1.0),
            HistoryRow::new(d(2024, 1, 3)).with("close", 2.0).with("volume", 5.0),
        ];
        let mut builder = FlatStoreBuilder::new();
        store_fields(
            &mut builder,
            "A",
            &rows,
            &strings(&["volume"]),
            &RecordingDiagnostics::new(),
        );
        let store = builder.build();
        let volume = store.get(&SeriesKey::new("A", "volume")).unwrap();
        assert!(volume[0].is_nan());
        assert_eq!(volume[1], 5.0);
    }
}
