//! Per-identifier fallback chain.
//!
//! Strategies run strictly in order. The first one that returns non-empty,
//! well-formed rows wins; errors and empty results move on to the next.

use super::chunker::RangeChunker;
use super::diagnostics::{Diagnostic, Diagnostics};
use super::provider::{DataError, FetchOptions, HistoryProvider, HistoryRow, PeriodBucket};
use super::range::DateRange;

/// One way of retrieving an identifier's history.
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<HistoryRow>, DataError>;
}

/// Single request for the whole range.
#[derive(Debug, Clone)]
pub struct DirectRange {
    options: FetchOptions,
}

impl Default for DirectRange {
    fn default() -> Self {
        Self {
            options: FetchOptions::direct(),
        }
    }
}

impl FetchStrategy for DirectRange {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn fetch(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        _diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<HistoryRow>, DataError> {
        provider.fetch_range(identifier, range, &self.options)
    }
}

/// Range split into bounded chunks, merged afterwards.
#[derive(Debug, Clone, Default)]
pub struct ChunkedRange {
    chunker: RangeChunker,
}

impl ChunkedRange {
    pub fn new(chunker: RangeChunker) -> Self {
        Self { chunker }
    }
}

impl FetchStrategy for ChunkedRange {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn fetch(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<HistoryRow>, DataError> {
        let report = self
            .chunker
            .fetch_chunks(provider, identifier, range, diagnostics);

        if report.succeeded == 0 && report.failed > 0 {
            return Err(DataError::Other(format!(
                "all {} chunks failed (last: {})",
                report.failed,
                report.last_error.unwrap_or_default()
            )));
        }
        Ok(report.rows)
    }
}

/// Coarse period request trimmed back to the range.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodWindow;

impl FetchStrategy for PeriodWindow {
    fn name(&self) -> &'static str {
        "period"
    }

    fn fetch(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        _diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<HistoryRow>, DataError> {
        let period = PeriodBucket::for_days(range.days());
        let rows = provider.fetch_period(identifier, period)?;
        Ok(rows
            .into_iter()
            .filter(|row| range.contains(row.date))
            .collect())
    }
}

/// Result of running the chain for one identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        strategy: &'static str,
        rows: Vec<HistoryRow>,
    },
    /// At least one strategy reached the provider successfully, none had rows.
    Empty,
    /// Every strategy errored.
    Failed { reasons: Vec<String> },
}

impl FetchOutcome {
    pub fn rows(&self) -> &[HistoryRow] {
        match self {
            FetchOutcome::Success { rows, .. } => rows,
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Ordered list of strategies.
pub struct FallbackFetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl Default for FallbackFetcher {
    fn default() -> Self {
        Self::standard(RangeChunker::default())
    }
}

impl FallbackFetcher {
    /// Direct, then chunked with `chunker`, then period.
    pub fn standard(chunker: RangeChunker) -> Self {
        Self::with_strategies(vec![
            Box::new(DirectRange::default()),
            Box::new(ChunkedRange::new(chunker)),
            Box::new(PeriodWindow),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Append a strategy to the end of the chain.
    pub fn push(&mut self, strategy: Box<dyn FetchStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain for one identifier.
    pub fn fetch_one(
        &self,
        provider: &dyn HistoryProvider,
        identifier: &str,
        range: DateRange,
        diagnostics: &dyn Diagnostics,
    ) -> FetchOutcome {
        let mut reasons = Vec::new();
        let mut reached_provider = false;

        for strategy in &self.strategies {
            match strategy.fetch(provider, identifier, range, diagnostics) {
                Ok(rows) if rows.is_empty() => {
                    reached_provider = true;
                    diagnostics.emit(Diagnostic::StrategyEmpty {
                        identifier: identifier.to_string(),
                        strategy: strategy.name(),
                    });
                }
                Ok(rows) if !is_well_formed(&rows) => {
                    let reason = format!(
                        "{}: {}",
                        strategy.name(),
                        DataError::ResponseFormatChanged("rows carry no fields".into())
                    );
                    diagnostics.emit(Diagnostic::StrategyFailed {
                        identifier: identifier.to_string(),
                        strategy: strategy.name(),
                        reason: reason.clone(),
                    });
                    reasons.push(reason);
                }
                Ok(rows) => {
                    diagnostics.emit(Diagnostic::IdentifierFetched {
                        identifier: identifier.to_string(),
                        strategy: strategy.name(),
                        rows: rows.len(),
                    });
                    return FetchOutcome::Success {
                        strategy: strategy.name(),
                        rows,
                    };
                }
                Err(e) => {
                    diagnostics.emit(Diagnostic::StrategyFailed {
                        identifier: identifier.to_string(),
                        strategy: strategy.name(),
                        reason: e.to_string(),
                    });
                    reasons.push(format!("{}: {e}", strategy.name()));
                }
            }
        }

        if reached_provider {
            FetchOutcome::Empty
        } else {
            FetchOutcome::Failed { reasons }
        }
    }
}

/// Rows count as well-formed when at least one carries a field value.
fn is_well_formed(rows: &[HistoryRow]) -> bool {
    rows.iter().any(|row| !row.values.is_empty())
}
