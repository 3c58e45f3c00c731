//! Flat series store keyed by (identifier, field).
//!
//! The store is filled once through [`FlatStoreBuilder`] and is read-only
//! afterwards. Keys are structured; the `identifier_field` string form is only
//! produced for display and column names.

use std::collections::HashMap;
use std::fmt;

/// Composite key of one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    identifier: String,
    field: String,
}

impl SeriesKey {
    pub fn new(identifier: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            field: field.into(),
        }
    }

    /// Split a delimited key on its first `_`.
    ///
    /// Lossy for identifiers that themselves contain `_`.
    pub fn parse(key: &str) -> Option<Self> {
        key.split_once('_')
            .map(|(identifier, field)| Self::new(identifier, field))
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.identifier, self.field)
    }
}

/// Insertion-ordered, immutable map from [`SeriesKey`] to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatStore {
    entries: Vec<(SeriesKey, Vec<f64>)>,
    index: HashMap<SeriesKey, usize>,
}

impl FlatStore {
    pub fn get(&self, key: &SeriesKey) -> Option<&[f64]> {
        self.index
            .get(key)
            .map(|&i| self.entries[i].1.as_slice())
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &[f64])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Distinct identifiers with at least one stored series, in insertion order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for key in self.keys() {
            if !out.contains(&key.identifier()) {
                out.push(key.identifier());
            }
        }
        out
    }
}

/// Write side of a [`FlatStore`]; consumed by [`build`](Self::build).
#[derive(Debug, Default)]
pub struct FlatStoreBuilder {
    store: FlatStore,
}

impl FlatStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series. Returns false and leaves the store untouched when the
    /// key is already present.
    pub fn insert(&mut self, key: SeriesKey, values: Vec<f64>) -> bool {
        if self.store.index.contains_key(&key) {
            return false;
        }
        self.store.index.insert(key.clone(), self.store.entries.len());
        self.store.entries.push((key, values));
        true
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn build(self) -> FlatStore {
        self.store
    }
}
