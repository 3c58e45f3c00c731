//! Universe files: sector-organized identifier lists.
//!
//! ```toml
//! [sectors]
//! Technology = ["AAPL", "MSFT"]
//! ETFs = ["SPY", "QQQ"]
//! ```

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(format!("universe: {e}")))
    }

    /// Every identifier, sectors in name order, first occurrence kept.
    pub fn all_identifiers(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for id in self.sectors.values().flatten() {
            if !out.contains(&id.as_str()) {
                out.push(id.as_str());
            }
        }
        out
    }

    pub fn sector(&self, name: &str) -> Option<&[String]> {
        self.sectors.get(name).map(|v| v.as_slice())
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[sectors]
Technology = ["AAPL", "MSFT"]
ETFs = ["SPY", "QQQ", "AAPL"]
"#;

    #[test]
    fn flattens_in_sector_order_without_duplicates() {
        let u = Universe::from_toml(SAMPLE).unwrap();
        assert_eq!(u.sector_names(), vec!["ETFs", "Technology"]);
        assert_eq!(u.all_identifiers(), vec!["SPY", "QQQ", "AAPL", "MSFT"]);
    }

    #[test]
    fn sector_lookup() {
        let u = Universe::from_toml(SAMPLE).unwrap();
        assert_eq!(u.sector("Technology").unwrap(), ["AAPL", "MSFT"]);
        assert!(u.sector("Energy").is_none());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Universe::from_toml("sectors = 3"),
            Err(ConfigError::Parse(_))
        ));
    }
}
