//! Configuration for search and indexing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeSearchError};

/// Configuration of the search engine and its execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of identifiers a search returns.
    pub max_results: usize,
    /// Maximum nesting of operators below the result scope.
    pub max_scope_depth: usize,
    /// Surface backend failures instead of degrading to empty results.
    pub strict: bool,
    /// Cache free-text results.
    pub cache_enabled: bool,
    /// Lifetime of cached results in seconds. Writes do not invalidate them.
    pub cache_ttl_secs: u64,
    /// Fields a free-text query falls back to when none are ranked.
    pub free_text_field_limit: usize,
    /// Attribute names treated as free-text fields, in priority order.
    pub priority_field_names: Vec<String>,
    /// Reactive indexing settings.
    pub indexing: IndexingConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            max_results: 1000,
            max_scope_depth: 32,
            strict: false,
            cache_enabled: true,
            cache_ttl_secs: 30,
            free_text_field_limit: 5,
            priority_field_names: [
                "label",
                "title",
                "name",
                "file_name",
                "filename",
                "content",
                "description",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            indexing: IndexingConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: SearchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(ScopeSearchError::invalid_argument(
                "max_results must be greater than zero",
            ));
        }
        if self.max_scope_depth == 0 {
            return Err(ScopeSearchError::invalid_argument(
                "max_scope_depth must be greater than zero",
            ));
        }
        if self.indexing.workers == 0 {
            return Err(ScopeSearchError::invalid_argument(
                "indexing.workers must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Lifetime of cached results.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Configuration of the reactive indexing workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Worker threads draining the job queue.
    pub workers: usize,
    /// Retries per failed job after its first attempt.
    pub max_retries: u8,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        IndexingConfig {
            workers: num_cpus::get().max(1),
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_search_config_default() {
        let config = SearchConfig::default();
        assert_eq!(config.max_results, 1000);
        assert_eq!(config.max_scope_depth, 32);
        assert!(!config.strict);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.priority_field_names[0], "label");
        assert_eq!(config.indexing.max_retries, 3);
        assert!(config.indexing.workers >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_results": 50, "strict": true, "indexing": {{"workers": 2}}}}"#
        )
        .unwrap();

        let config = SearchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_results, 50);
        assert!(config.strict);
        assert_eq!(config.indexing.workers, 2);
        assert_eq!(config.indexing.max_retries, 3);
        assert_eq!(config.max_scope_depth, 32);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_results": 0}}"#).unwrap();
        assert!(SearchConfig::from_file(file.path()).is_err());

        let config = SearchConfig {
            max_scope_depth: 0,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
