//! Coordinator configuration
//!
//! Loaded once, from JSON, before the coordinator is built. Every field has a
//! default, so an empty object is a valid configuration. Unknown fields are
//! rejected rather than ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bulk::ErrorPolicy;
use crate::observability::{log_event, Event, Logger, Severity};
use crate::store::messages;
use crate::validator::HistoryLayout;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Document type of the per-index lock sentinel.
    pub lock_type: String,

    /// Document id of the per-index lock sentinel.
    pub lock_id: String,

    /// Appended to a document type to form its history type.
    pub history_suffix: String,

    /// Failure message fragments tolerated during compensation and re-indexing.
    pub lenient_patterns: Vec<String>,

    /// Minimum log severity (TRACE, INFO, WARN, ERROR, FATAL).
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_type: "$lock".to_string(),
            lock_id: "global".to_string(),
            history_suffix: "$history".to_string(),
            lenient_patterns: vec![
                messages::ALREADY_EXISTS.to_string(),
                messages::VERSION_CONFLICT.to_string(),
                messages::DOCUMENT_MISSING.to_string(),
            ],
            log_level: "INFO".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log_event(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string()), ("log_level", &config.log_level)],
        );
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.lock_type.trim().is_empty() {
            return Err(ConfigError::Invalid("lock_type must not be empty".into()));
        }
        if self.lock_id.trim().is_empty() {
            return Err(ConfigError::Invalid("lock_id must not be empty".into()));
        }
        if self.history_suffix.is_empty() {
            return Err(ConfigError::Invalid("history_suffix must not be empty".into()));
        }
        if self.lock_type == self.history_suffix {
            return Err(ConfigError::Invalid(
                "lock_type and history_suffix must differ".into(),
            ));
        }
        self.min_severity()?;
        Ok(())
    }

    pub fn min_severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown log_level {}", self.log_level)))
    }

    /// Policy used for compensation and forced re-indexing.
    pub fn lenient_policy(&self) -> ErrorPolicy {
        ErrorPolicy::tolerating(self.lenient_patterns.iter().cloned())
    }

    pub fn history_layout(&self) -> HistoryLayout {
        HistoryLayout::new(self.history_suffix.clone())
    }

    /// Apply `log_level` to the process-wide logger.
    pub fn apply_logging(&self) -> ConfigResult<()> {
        Logger::set_min_severity(self.min_severity()?);
        Ok(())
    }
}
