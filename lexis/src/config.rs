//! Index configuration.

use crate::interface::{IndexError, IndexResult};
use crate::wildcard::DEFAULT_NGRAM_WIDTH;
use serde::{Deserialize, Serialize};

/// Default number of entries kept by [`crate::storage::CachedStore`]
/// when built through [`IndexConfig::cache_capacity`].
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Width of the n-grams in the wildcard index; also the minimum number
    /// of literal characters a wildcard pattern needs.
    pub ngram_width: usize,
    /// Prune postings that point at removed documents after a search.
    pub repair_stale: bool,
    pub cache_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ngram_width: DEFAULT_NGRAM_WIDTH,
            repair_stale: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl IndexConfig {
    pub fn with_ngram_width(mut self, width: usize) -> Self {
        self.ngram_width = width;
        self
    }

    pub fn with_repair_stale(mut self, repair: bool) -> Self {
        self.repair_stale = repair;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.ngram_width < 2 {
            return Err(IndexError::InvalidInput(format!(
                "ngram_width must be at least 2, got {}",
                self.ngram_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.ngram_width, 3);
        assert!(config.repair_stale);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_narrow_ngrams() {
        assert!(IndexConfig::default().with_ngram_width(1).validate().is_err());
        assert!(IndexConfig::default().with_ngram_width(2).validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: IndexConfig = serde_json::from_str(r#"{"repair_stale": false}"#).unwrap();
        assert_eq!(config, IndexConfig::default().with_repair_stale(false));
    }
}
