//! histfetch core: historical market data with a fallback fetch pipeline.
//!
//! This crate contains:
//! - The `HistoryProvider` boundary and two providers (Yahoo chart API, CSV directory)
//! - Chunked range retrieval with merge and de-duplication
//! - A per-identifier fallback chain (direct → chunked → period)
//! - The batch orchestrator that builds an immutable flat series store
//! - Column projection into an (identifier × field) table

pub mod config;
pub mod data;

pub use config::{ConfigError, FetchConfig, FetchSettings};
pub use data::{
    DataError, DateRange, Diagnostics, HistoryProvider, MarketDataSet, ProjectedTable, Selection,
};
