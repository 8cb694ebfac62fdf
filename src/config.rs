//! Audit configuration loaded from a JSON file.
//!
//! ```json
//! {
//!   "scoring": { "error_penalty": 25, "weights": { "stop_id_unique": 1.5 } },
//!   "parameters": {
//!     "stops.txt": { "hierarchy_analysis": { "require_stations": false } },
//!     "stop_times.txt": { "temporal_analysis": { "max_dwell_minutes": 30 } }
//!   }
//! }
//! ```
//!
//! Every section is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::scoring::PenaltyConfig;

/// Environment variable naming the config file when none is given.
pub const CONFIG_ENV: &str = "GTFS_AUDIT_CONFIG";

/// Overrides for one registered audit, keyed by parameter name.
pub type ParameterOverrides = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub scoring: PenaltyConfig,
    /// file -> audit category -> overrides
    pub parameters: BTreeMap<String, BTreeMap<String, ParameterOverrides>>,
}

impl AuditConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Loads `path` if given, else the file named by [`CONFIG_ENV`], else
    /// the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var(CONFIG_ENV) {
                Ok(env_path) if !env_path.is_empty() => Self::load(env_path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Overrides configured for `category` of `file`, if any.
    pub fn overrides(&self, file: &str, category: &str) -> Option<&ParameterOverrides> {
        self.parameters.get(file)?.get(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "scoring": {{ "error_penalty": 25 }},
                "parameters": {{
                    "stops.txt": {{ "hierarchy_analysis": {{ "require_stations": false }} }}
                }}
            }}"#
        )
        .unwrap();

        let config = AuditConfig::load(file.path()).unwrap();
        assert_eq!(config.scoring.error_penalty, 25.0);
        assert_eq!(config.scoring.warning_penalty, 5.0);
        assert_eq!(
            config.overrides("stops.txt", "hierarchy_analysis").unwrap()["require_stations"],
            json!(false)
        );
        assert!(config.overrides("stops.txt", "accessibility").is_none());
        assert!(config.overrides("trips.txt", "accessibility").is_none());
    }

    #[test]
    fn test_empty_object_is_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        assert_eq!(AuditConfig::load(file.path()).unwrap(), AuditConfig::default());
    }

    #[test]
    fn test_load_errors_carry_path() {
        let err = AuditConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(AuditConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "scoring": {{ "max_score": 50 }} }}"#).unwrap();
        let config = AuditConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.scoring.max_score, 50.0);
    }
}
