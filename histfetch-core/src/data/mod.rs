//! Historical data retrieval: providers, fallback pipeline, flat store and
//! column projection.

pub mod chunker;
pub mod csv_dir;
pub mod dataset;
pub mod diagnostics;
pub mod download;
pub mod fallback;
pub mod projector;
pub mod provider;
pub mod range;
pub mod store;
pub mod universe;
pub mod yahoo;

pub use chunker::{plan_chunks, RangeChunker};
pub use csv_dir::CsvDirProvider;
pub use dataset::MarketDataSet;
pub use diagnostics::{
    Diagnostic, Diagnostics, NullDiagnostics, RecordingDiagnostics, SelectionKind,
    TracingDiagnostics,
};
pub use download::{FetchOrchestrator, FetchReport};
pub use fallback::{FallbackFetcher, FetchOutcome, FetchStrategy};
pub use projector::{identifiers_of, ColumnProjector, ProjectedTable, Selection};
pub use provider::{DataError, FetchOptions, HistoryProvider, HistoryRow, PeriodBucket};
pub use range::DateRange;
pub use store::{FlatStore, SeriesKey};
pub use universe::Universe;
pub use yahoo::YahooProvider;
