//! Adapter Configuration
//!
//! Configuration supplied when constructing an [`Adapter`](crate::adapter::Adapter).
//! Every field has a default, so a partial JSON document is valid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document could not be parsed
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Filter repeated keys out of unique traversals (default: true)
    #[serde(default = "default_dedupe_unique_cursors")]
    pub dedupe_unique_cursors: bool,

    /// Minimum severity written to the log (default: WARN)
    #[serde(default = "default_log_severity")]
    pub log_severity: Severity,

    /// Record counters in the adapter's metrics registry (default: true)
    #[serde(default = "default_record_metrics")]
    pub record_metrics: bool,
}

fn default_dedupe_unique_cursors() -> bool {
    true
}

fn default_log_severity() -> Severity {
    Severity::Warn
}

fn default_record_metrics() -> bool {
    true
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            dedupe_unique_cursors: default_dedupe_unique_cursors(),
            log_severity: default_log_severity(),
            record_metrics: default_record_metrics(),
        }
    }
}

impl AdapterConfig {
    /// Parse a JSON configuration document
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(document)?)
    }

    /// Config with unique-key filtering switched on or off
    pub fn with_dedupe(dedupe_unique_cursors: bool) -> Self {
        Self {
            dedupe_unique_cursors,
            ..Self::default()
        }
    }

    /// Config logging everything at or above `log_severity`
    pub fn with_log_severity(log_severity: Severity) -> Self {
        Self {
            log_severity,
            ..Self::default()
        }
    }
}
