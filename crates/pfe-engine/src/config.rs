//! # Engine Configuration
//!
//! Loaded from YAML, then overridden from `PFE_*` environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PFE_STORAGE_KEY` | `persistence.storage_key` |
//! | `PFE_QUERY_PREFIX` | `persistence.query_prefix` |
//! | `PFE_STORAGE_ENABLED` | `persistence.storage_enabled` |
//! | `PFE_QUERY_ENABLED` | `persistence.query_enabled` |
//! | `PFE_DEBOUNCE_MS` | `persistence.debounce_ms` |
//! | `PFE_PERFORMANCE_THRESHOLD` | `conflicts.performance_threshold` |
//! | `PFE_NEAR_EMPTY_THRESHOLD` | `conflicts.near_empty_threshold` |
//! | `PFE_AUTO_RESOLVE` | `conflicts.auto_resolve` |
//! | `PFE_PRESET_CATALOG` | `preset_catalog` |
//! | `PFE_STORAGE_DIR` | `storage_dir` |
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use pfe_persist::PersistenceConfig;
use pfe_validate::CombinationContext;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

const ENV_PREFIX: &str = "PFE_";

/// Thresholds and policy for conflict surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Active high-cardinality paths tolerated alongside a search query.
    pub performance_threshold: usize,
    /// Estimated counts below this raise a data-availability conflict.
    pub near_empty_threshold: u64,
    /// Apply auto-resolvable suggestions while settling.
    pub auto_resolve: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        let ctx = CombinationContext::default();
        Self {
            performance_threshold: ctx.performance_threshold,
            near_empty_threshold: ctx.near_empty_threshold,
            auto_resolve: false,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Storage and query-string mirroring.
    pub persistence: PersistenceConfig,
    /// Conflict thresholds and policy.
    pub conflicts: ConflictConfig,
    /// Preset catalog to use instead of the built-in one.
    pub preset_catalog: Option<PathBuf>,
    /// Root of per-session storage directories.
    pub storage_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Parse YAML.
    pub fn from_yaml_str(text: &str) -> Result<Self, EngineError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| EngineError::Config(format!("invalid YAML: {e}")))
    }

    /// Read and parse a YAML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Result<Self, EngineError> {
        self.apply_env(std::env::vars())?;
        Ok(self)
    }

    /// Apply `PFE_*` overrides from `vars`. Other variables are ignored.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else { continue };
            let value = value.as_ref();
            let p = &mut self.persistence;
            match name {
                "STORAGE_KEY" => p.storage_key = value.to_string(),
                "QUERY_PREFIX" => p.query_prefix = value.to_string(),
                "STORAGE_ENABLED" => p.storage_enabled = parse_bool(key.as_ref(), value)?,
                "QUERY_ENABLED" => p.query_enabled = parse_bool(key.as_ref(), value)?,
                "DEBOUNCE_MS" => p.debounce_ms = parse(key.as_ref(), value)?,
                "PERFORMANCE_THRESHOLD" => self.conflicts.performance_threshold = parse(key.as_ref(), value)?,
                "NEAR_EMPTY_THRESHOLD" => self.conflicts.near_empty_threshold = parse(key.as_ref(), value)?,
                "AUTO_RESOLVE" => self.conflicts.auto_resolve = parse_bool(key.as_ref(), value)?,
                "PRESET_CATALOG" => self.preset_catalog = non_empty_path(value),
                "STORAGE_DIR" => self.storage_dir = non_empty_path(value),
                _ => tracing::debug!(variable = key.as_ref(), "unrecognised PFE_ variable ignored"),
            }
        }
        Ok(())
    }

    /// Human-readable problems with this configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.persistence.validate();
        if self.conflicts.performance_threshold == 0 {
            problems.push("conflicts.performance_threshold must be at least 1".to_string());
        }
        if let Some(path) = &self.preset_catalog {
            if !path.exists() {
                problems.push(format!("preset_catalog {} does not exist", path.display()));
            }
        }
        problems
    }

    /// A combination context with these thresholds and `estimate`.
    pub fn combination_context(&self, estimate: Option<u64>) -> CombinationContext {
        CombinationContext {
            estimated_result_count: estimate,
            performance_threshold: self.conflicts.performance_threshold,
            near_empty_threshold: self.conflicts.near_empty_threshold,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("{key}={value:?}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, EngineError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EngineError::Config(format!("{key}={value:?}: expected a boolean"))),
    }
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let v = value.trim();
    (!v.is_empty()).then(|| PathBuf::from(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
        assert!(EngineConfig::default().validate().is_empty());
    }

    #[test]
    fn test_partial_yaml() {
        let config = EngineConfig::from_yaml_str(
            "persistence:\n  debounce_ms: 250\n  query_enabled: false\nconflicts:\n  auto_resolve: true\n",
        )
        .unwrap();
        assert_eq!(config.persistence.debounce_ms, 250);
        assert!(!config.persistence.query_enabled);
        assert_eq!(config.persistence.storage_key, "portfolio-filters");
        assert!(config.conflicts.auto_resolve);
        assert_eq!(config.conflicts.performance_threshold, 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_env([
                ("PFE_DEBOUNCE_MS", "150"),
                ("PFE_QUERY_PREFIX", "flt_"),
                ("PFE_AUTO_RESOLVE", "yes"),
                ("PFE_STORAGE_DIR", "/tmp/pfe"),
                ("HOME", "/root"),
            ])
            .unwrap();
        assert_eq!(config.persistence.debounce_ms, 150);
        assert_eq!(config.persistence.query_prefix, "flt_");
        assert!(config.conflicts.auto_resolve);
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/pfe")));
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = EngineConfig::default();
        assert!(config.apply_env([("PFE_DEBOUNCE_MS", "soon")]).is_err());
        assert!(config.apply_env([("PFE_QUERY_ENABLED", "maybe")]).is_err());
    }

    #[test]
    fn test_validate_collects_problems() {
        let mut config = EngineConfig::default();
        config.conflicts.performance_threshold = 0;
        config.persistence.debounce_ms = 20_000;
        config.preset_catalog = Some(PathBuf::from("/definitely/not/here.yaml"));
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn test_combination_context_uses_thresholds() {
        let mut config = EngineConfig::default();
        config.conflicts.near_empty_threshold = 25;
        let ctx = config.combination_context(Some(12));
        assert_eq!(ctx.near_empty_threshold, 25);
        assert_eq!(ctx.estimated_result_count, Some(12));
    }
}
