//! Frozen result of a batch fetch plus the query surface over it.

use super::diagnostics::Diagnostics;
use super::download::{FetchOrchestrator, FetchReport};
use super::projector::{identifiers_of, ColumnProjector, ProjectedTable, Selection};
use super::provider::{DataError, HistoryProvider};
use super::range::DateRange;
use super::store::FlatStore;
use crate::config::{FetchConfig, FetchSettings};

/// Historical series for a configured set of identifiers and fields.
///
/// Built once; nothing here mutates after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataSet {
    report: FetchReport,
}

impl MarketDataSet {
    /// Validate `config`, fetch everything, and freeze the result.
    pub fn fetch(
        provider: &dyn HistoryProvider,
        config: &FetchConfig,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Self, DataError> {
        config.validate()?;
        Self::build(
            provider,
            config.date_range()?,
            &config.resolved_identifiers()?,
            &config.fields,
            &config.fetch,
            diagnostics,
        )
    }

    pub fn build(
        provider: &dyn HistoryProvider,
        range: DateRange,
        identifiers: &[String],
        fields: &[String],
        settings: &FetchSettings,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Self, DataError> {
        let report = FetchOrchestrator::from_settings(settings).build(
            provider,
            range,
            identifiers,
            fields,
            diagnostics,
        )?;
        Ok(Self { report })
    }

    pub fn range(&self) -> DateRange {
        self.report.range
    }

    pub fn identifiers(&self) -> &[String] {
        &self.report.identifiers
    }

    pub fn fields(&self) -> &[String] {
        &self.report.fields
    }

    pub fn store(&self) -> &FlatStore {
        &self.report.store
    }

    pub fn report(&self) -> &FetchReport {
        &self.report
    }

    /// Table for the requested subset; `Selection::All` means everything
    /// configured.
    pub fn project(
        &self,
        fields: &Selection,
        identifiers: &Selection,
        diagnostics: &dyn Diagnostics,
    ) -> ProjectedTable {
        ColumnProjector::new(self.store(), self.identifiers(), self.fields()).project(
            fields,
            identifiers,
            diagnostics,
        )
    }

    /// Identifier portion of `identifier_field` keys.
    pub fn identifiers_of<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        identifiers_of(keys)
    }
}
