use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Where the backing SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "path", rename_all = "snake_case")]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// How inverted index tables are rebuilt on ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRebuild {
    /// Index rows are inserted without clearing. A second ingestion that
    /// produces a keyword already present fails with an ingestion error.
    #[default]
    BuildOnce,
    /// Index tables are emptied before each rebuild, so ingestion can be
    /// called repeatedly.
    ClearAndRebuild,
}

/// Configuration for a [`SearchEngine`](crate::engine::SearchEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database: DatabaseLocation,

    #[serde(default)]
    pub rebuild: IndexRebuild,

    /// Run the primary insert and the index rebuild in one transaction.
    ///
    /// When disabled, the primary insert commits on its own before the
    /// rebuild starts; a failing rebuild then leaves primary rows without
    /// matching index rows.
    #[serde(default = "default_transactional_ingest")]
    pub transactional_ingest: bool,

    /// Value for `PRAGMA journal_mode`, applied when the database is opened.
    #[serde(default)]
    pub journal_mode: Option<String>,
}

fn default_transactional_ingest() -> bool {
    true
}

impl EngineConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    pub fn rebuild(mut self, rebuild: IndexRebuild) -> Self {
        self.rebuild = rebuild;
        self
    }

    pub fn transactional_ingest(mut self, enabled: bool) -> Self {
        self.transactional_ingest = enabled;
        self
    }

    pub fn journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.journal_mode = Some(mode.into());
        self
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(mode) = &self.journal_mode {
            let known = ["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];
            if !known.iter().any(|k| k.eq_ignore_ascii_case(mode)) {
                return Err(SearchError::config(format!(
                    "unknown journal_mode '{mode}', expected one of {known:?}"
                )));
            }
        }
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(SearchError::config("database path must not be empty"));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            rebuild: IndexRebuild::default(),
            transactional_ingest: default_transactional_ingest(),
            journal_mode: None,
        }
    }
}
