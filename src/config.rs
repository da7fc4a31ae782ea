//! Search service configuration, loadable from TOML.

use crate::error::Result;
use crate::search::semantic::{DisabledIndexer, SemanticIndexer, TfIdfIndexer};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration for a [`SearchManager`](crate::SearchManager).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum number of cached query results
    pub cache_capacity: usize,
    /// Concurrent record-store sessions
    pub pool_size: usize,
    /// How long to wait for a store session before giving up
    pub acquire_timeout_ms: u64,
    pub semantic: SemanticConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            pool_size: 4,
            acquire_timeout_ms: 5_000,
            semantic: SemanticConfig::default(),
        }
    }
}

/// TF-IDF vectorizer settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SemanticConfig {
    pub enabled: bool,
    /// Vocabulary cap, keeping the most frequent terms
    pub max_features: usize,
    /// Terms must appear in at least this many records
    pub min_df: usize,
    /// Longest word n-gram in the vocabulary
    pub ngram_max: usize,
    /// Results need a cosine similarity strictly above this
    pub min_similarity: f32,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_features: 1_000,
            min_df: 2,
            ngram_max: 2,
            min_similarity: 0.1,
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse search configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// `<config dir>/chat-archive-search/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chat-archive-search").join("config.toml"))
    }

    /// Loads `path`, or the default location when `None`. A missing file yields defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// The semantic capability selected by this configuration.
    pub fn indexer(&self) -> Arc<dyn SemanticIndexer> {
        if self.semantic.enabled {
            Arc::new(TfIdfIndexer::new(self.semantic.clone()))
        } else {
            Arc::new(DisabledIndexer)
        }
    }
}
