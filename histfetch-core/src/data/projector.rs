//! Column projection: a validated (identifier × field) view over the flat store.

use super::diagnostics::{Diagnostic, Diagnostics, SelectionKind};
use super::provider::DataError;
use super::store::{FlatStore, SeriesKey};
use polars::prelude::*;
use std::io::Write;

/// Which configured entries a query asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// The whole configured set.
    #[default]
    All,
    Only(Vec<String>),
}

impl Selection {
    pub fn only<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(items.into_iter().map(Into::into).collect())
    }
}

/// Projects queries against a store and the sets it was built from.
#[derive(Debug, Clone, Copy)]
pub struct ColumnProjector<'a> {
    store: &'a FlatStore,
    identifiers: &'a [String],
    fields: &'a [String],
}

impl<'a> ColumnProjector<'a> {
    pub fn new(store: &'a FlatStore, identifiers: &'a [String], fields: &'a [String]) -> Self {
        Self {
            store,
            identifiers,
            fields,
        }
    }

    /// Build the table for the requested fields and identifiers.
    ///
    /// Unconfigured names are dropped with a warning. Keys that were
    /// configured but never fetched are dropped with a warning. Columns come
    /// out identifier-major, in configured order.
    pub fn project(
        &self,
        fields: &Selection,
        identifiers: &Selection,
        diagnostics: &dyn Diagnostics,
    ) -> ProjectedTable {
        let identifiers = validate_selection(
            SelectionKind::Identifier,
            identifiers,
            self.identifiers,
            diagnostics,
        );
        let fields = validate_selection(SelectionKind::Field, fields, self.fields, diagnostics);

        let mut columns = Vec::new();
        let mut missing = Vec::new();
        for key in cross_keys(&identifiers, &fields) {
            match self.store.get(&key) {
                Some(values) => columns.push((key, values.to_vec())),
                None => missing.push(key.to_string()),
            }
        }

        if !missing.is_empty() {
            diagnostics.emit(Diagnostic::MissingKeys { keys: missing });
        }

        ProjectedTable { columns }
    }
}

/// `requested ∩ configured`, in configured order.
///
/// Requested names outside the configured set are reported once each.
pub fn validate_selection(
    kind: SelectionKind,
    requested: &Selection,
    configured: &[String],
    diagnostics: &dyn Diagnostics,
) -> Vec<String> {
    let requested = match requested {
        Selection::All => return configured.to_vec(),
        Selection::Only(names) => names,
    };

    let mut unknown: Vec<String> = Vec::new();
    for name in requested {
        if !configured.contains(name) && !unknown.contains(name) {
            unknown.push(name.clone());
        }
    }
    if !unknown.is_empty() {
        diagnostics.emit(Diagnostic::UnknownSelection {
            kind,
            names: unknown,
        });
    }

    configured
        .iter()
        .filter(|c| requested.contains(c))
        .cloned()
        .collect()
}

/// Every identifier paired with every field, identifier varying slowest.
pub fn cross_keys(identifiers: &[String], fields: &[String]) -> Vec<SeriesKey> {
    identifiers
        .iter()
        .flat_map(|id| fields.iter().map(move |f| SeriesKey::new(id.as_str(), f.as_str())))
        .collect()
}

/// Identifier portion (text before the first `_`) of delimited keys.
pub fn identifiers_of<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            key.split_once('_').map_or(key, |(id, _)| id).to_string()
        })
        .collect()
}

/// Ordered columns of a projection.
///
/// Values are row-index aligned exactly as stored; no realignment by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedTable {
    columns: Vec<(SeriesKey, Vec<f64>)>,
}

impl ProjectedTable {
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Length of the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&SeriesKey, &[f64])> {
        self.columns.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.columns.iter().map(|(k, _)| k)
    }

    /// `identifier_field` column names.
    pub fn column_names(&self) -> Vec<String> {
        self.keys().map(|k| k.to_string()).collect()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Look up a column by its delimited name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(k, _)| k.to_string() == name)
            .map(|(_, v)| v.as_slice())
    }

    /// Distinct identifiers in column order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for key in self.keys() {
            if !out.contains(&key.identifier()) {
                out.push(key.identifier());
            }
        }
        out
    }

    /// Convert to a polars DataFrame, padding short columns with nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame, DataError> {
        let height = self.row_count();
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|(key, values)| {
                let padded: Vec<Option<f64>> = (0..height).map(|i| values.get(i).copied()).collect();
                Column::new(key.to_string().into(), padded)
            })
            .collect();

        DataFrame::new(columns)
            .map_err(|e| DataError::Other(format!("dataframe creation: {e}")))
    }

    /// Write the table as CSV: one header row of column names, then one line
    /// per row index. Cells past a column's end are left blank.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.column_names())
            .map_err(|e| DataError::Csv(e.to_string()))?;

        for i in 0..self.row_count() {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|(_, values)| values.get(i).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            out.write_record(&record)
                .map_err(|e| DataError::Csv(e.to_string()))?;
        }

        out.flush().map_err(|e| DataError::Io(e.to_string()))
    }
}
