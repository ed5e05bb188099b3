//! Reference backend configuration

use serde::{Deserialize, Serialize};

use crate::config::ConfigResult;
use crate::observability::Severity;

/// Backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Visit every record, not just the first per key, when a unique
    /// direction traverses a non-multi-entry index (default: false)
    #[serde(default)]
    pub duplicate_unique_steps: bool,

    /// Minimum severity written to the log (default: WARN)
    #[serde(default = "default_log_severity")]
    pub log_severity: Severity,
}

fn default_log_severity() -> Severity {
    Severity::Warn
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_unique_steps: false,
            log_severity: default_log_severity(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document
    pub fn from_json(document: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.duplicate_unique_steps);
        assert_eq!(config.log_severity, Severity::Warn);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_json(r#"{"duplicate_unique_steps": true}"#).unwrap();
        assert!(config.duplicate_unique_steps);
        assert_eq!(config.log_severity, Severity::Warn);
    }

    #[test]
    fn test_bad_severity() {
        assert!(EngineConfig::from_json(r#"{"log_severity": "LOUD"}"#).is_err());
    }
}
