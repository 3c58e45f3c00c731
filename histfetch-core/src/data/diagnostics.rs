//! Diagnostics sink for progress and warning messages.
//!
//! The pipeline never reads diagnostics back; a sink that drops everything
//! must not change any result.

use super::range::DateRange;
use std::fmt;
use std::sync::Mutex;

/// Which configured set a selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Identifier,
    Field,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKind::Identifier => f.write_str("identifiers"),
            SelectionKind::Field => f.write_str("fields"),
        }
    }
}

/// One diagnostic event.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    IdentifierStarted {
        identifier: String,
        index: usize,
        total: usize,
    },
    StrategyFailed {
        identifier: String,
        strategy: &'static str,
        reason: String,
    },
    StrategyEmpty {
        identifier: String,
        strategy: &'static str,
    },
    ChunkFailed {
        identifier: String,
        range: DateRange,
        reason: String,
    },
    IdentifierFetched {
        identifier: String,
        strategy: &'static str,
        rows: usize,
    },
    /// Every strategy ran without error but returned no rows.
    IdentifierEmpty { identifier: String },
    /// Every strategy errored.
    IdentifierFailed {
        identifier: String,
        reasons: Vec<String>,
    },
    FieldMissing {
        identifier: String,
        field: String,
        available: Vec<String>,
    },
    DuplicateEntries {
        kind: SelectionKind,
        names: Vec<String>,
    },
    /// Requested names that are not part of the configured set.
    UnknownSelection {
        kind: SelectionKind,
        names: Vec<String>,
    },
    /// Projected keys with no stored series.
    MissingKeys { keys: Vec<String> },
    BatchComplete {
        total: usize,
        populated: usize,
        failed: Vec<String>,
        empty: Vec<String>,
    },
}

/// Write-only sink for diagnostics.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Routes diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::IdentifierStarted {
                identifier,
                index,
                total,
            } => tracing::info!(%identifier, "[{}/{}] fetching", index + 1, total),
            Diagnostic::StrategyFailed {
                identifier,
                strategy,
                reason,
            } => tracing::warn!(%identifier, strategy, %reason, "strategy failed"),
            Diagnostic::StrategyEmpty {
                identifier,
                strategy,
            } => tracing::debug!(%identifier, strategy, "strategy returned no rows"),
            Diagnostic::ChunkFailed {
                identifier,
                range,
                reason,
            } => tracing::warn!(%identifier, %range, %reason, "chunk fetch failed"),
            Diagnostic::IdentifierFetched {
                identifier,
                strategy,
                rows,
            } => tracing::info!(%identifier, strategy, rows, "fetched"),
            Diagnostic::IdentifierEmpty { identifier } => {
                tracing::warn!(%identifier, "no rows in requested range")
            }
            Diagnostic::IdentifierFailed {
                identifier,
                reasons,
            } => tracing::warn!(%identifier, reasons = ?reasons, "unable to fetch data"),
            Diagnostic::FieldMissing {
                identifier,
                field,
                available,
            } => tracing::warn!(
                %identifier,
                %field,
                available = ?available,
                "field not present in provider data"
            ),
            Diagnostic::DuplicateEntries { kind, names } => {
                tracing::warn!(%kind, names = ?names, "duplicate entries ignored")
            }
            Diagnostic::UnknownSelection { kind, names } => {
                tracing::warn!(%kind, names = ?names, "requested entries not configured")
            }
            Diagnostic::MissingKeys { keys } => {
                tracing::warn!(keys = ?keys, "missing data columns")
            }
            Diagnostic::BatchComplete {
                total,
                populated,
                failed,
                empty,
            } => {
                if !failed.is_empty() {
                    tracing::warn!(
                        count = failed.len(),
                        failed = ?failed,
                        "unable to fetch data for some identifiers"
                    );
                }
                if !empty.is_empty() {
                    tracing::info!(count = empty.len(), empty = ?empty, "identifiers with no rows");
                }
                tracing::info!(populated, total, "fetch complete");
            }
        }
    }
}

/// Drops every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn emit(&self, _diagnostic: Diagnostic) {}
}

/// Keeps every diagnostic in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_where(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| pred(d))
            .count()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn emit(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_order() {
        let sink = RecordingDiagnostics::new();
        sink.emit(Diagnostic::IdentifierEmpty {
            identifier: "A".into(),
        });
        sink.emit(Diagnostic::MissingKeys {
            keys: vec!["A_close".into()],
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Diagnostic::IdentifierEmpty { .. }));
        assert_eq!(
            sink.count_where(|d| matches!(d, Diagnostic::MissingKeys { .. })),
            1
        );
    }

    #[test]
    fn tracing_sink_accepts_every_variant() {
        // No subscriber installed: this only checks that emitting never panics.
        let sink = TracingDiagnostics;
        sink.emit(Diagnostic::BatchComplete {
            total: 2,
            populated: 1,
            failed: vec!["B".into()],
            empty: vec![],
        });
        sink.emit(Diagnostic::UnknownSelection {
            kind: SelectionKind::Identifier,
            names: vec!["ZZZZ".into()],
        });
    }

    #[test]
    fn selection_kind_display() {
        assert_eq!(SelectionKind::Identifier.to_string(), "identifiers");
        assert_eq!(SelectionKind::Field.to_string(), "fields");
    }
}
