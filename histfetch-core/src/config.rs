//! Serializable fetch configuration.

use crate::data::chunker::{DEFAULT_CHUNK_DAYS, DEFAULT_CHUNK_PAUSE};
use crate::data::provider::DataError;
use crate::data::range::DateRange;
use crate::data::universe::Universe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default pause between consecutive identifiers.
pub const DEFAULT_IDENTIFIER_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for DataError {
    fn from(e: ConfigError) -> Self {
        DataError::InvalidConfig(e.to_string())
    }
}

/// Batch fetch configuration.
///
/// ```toml
/// start = "2015-01-01"
/// end = "2024-12-31"
/// identifiers = ["AAPL", "MSFT"]
/// fields = ["close", "volume"]
///
/// [fetch]
/// chunk_days = 730
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Range start (inclusive), any format accepted by `parse_date`.
    pub start: String,
    /// Range end (inclusive).
    pub end: String,
    #[serde(default)]
    pub identifiers: Vec<String>,
    pub fields: Vec<String>,
    /// Optional sector universe file whose tickers are appended to
    /// `identifiers`. Relative paths resolve against the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchSettings,
}

impl FetchConfig {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        identifiers: Vec<String>,
        fields: Vec<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            identifiers,
            fields,
            universe: None,
            fetch: FetchSettings::default(),
        }
    }

    /// Load a config file. Call [`validate`](Self::validate) before use.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let (Some(universe), Some(dir)) = (config.universe.as_mut(), path.parent()) {
            if universe.is_relative() {
                *universe = dir.join(&*universe);
            }
        }
        Ok(config)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn date_range(&self) -> Result<DateRange, ConfigError> {
        DateRange::parse(&self.start, &self.end).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Explicit identifiers followed by the universe's tickers.
    pub fn resolved_identifiers(&self) -> Result<Vec<String>, ConfigError> {
        let mut out = self.identifiers.clone();
        if let Some(path) = &self.universe {
            let universe = Universe::from_file(path)?;
            out.extend(universe.all_identifiers().into_iter().map(String::from));
        }
        Ok(out)
    }

    /// Check everything that can be checked without a provider.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.date_range()?;
        if range.start > range.end {
            return Err(ConfigError::Invalid(format!(
                "start {} is after end {}",
                range.start, range.end
            )));
        }
        if self.fields.is_empty() {
            return Err(ConfigError::Invalid("at least one field is required".into()));
        }
        if self.resolved_identifiers()?.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one identifier is required".into(),
            ));
        }
        if self.fetch.chunk_days <= 0 {
            return Err(ConfigError::Invalid("chunk_days must be positive".into()));
        }
        Ok(())
    }
}

/// Chunking and pacing knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchSettings {
    /// Longest sub-range, in calendar days, requested by the chunked strategy.
    pub chunk_days: i64,
    /// Pause before each identifier after the first.
    pub identifier_pause_ms: u64,
    /// Pause before each chunk after the first.
    pub chunk_pause_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            chunk_days: DEFAULT_CHUNK_DAYS,
            identifier_pause_ms: DEFAULT_IDENTIFIER_PAUSE.as_millis() as u64,
            chunk_pause_ms: DEFAULT_CHUNK_PAUSE.as_millis() as u64,
        }
    }
}

impl FetchSettings {
    /// Default chunking with no pauses (tests, offline providers).
    pub fn immediate() -> Self {
        Self {
            identifier_pause_ms: 0,
            chunk_pause_ms: 0,
            ..Self::default()
        }
    }

    pub fn identifier_pause(&self) -> Duration {
        Duration::from_millis(self.identifier_pause_ms)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }
}
