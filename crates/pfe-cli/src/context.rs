//! Shared configuration and snapshot loading for subcommands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use pfe_core::SystemClock;
use pfe_engine::EngineConfig;
use pfe_persist::{decode_snapshot, DecodeReport};
use pfe_schema::Schema;
use pfe_state::FilterState;

/// Configuration and table shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Effective engine configuration.
    pub config: EngineConfig,
    /// The dimension table.
    pub schema: Arc<Schema>,
}

impl CliContext {
    /// A context over `config` and the portfolio table.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            schema: Arc::new(Schema::portfolio()),
        }
    }

    /// Load `config_path` (or defaults), apply `PFE_*` overrides, validate.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        }
        .with_env_overrides()?;
        let problems = config.validate();
        if !problems.is_empty() {
            bail!("invalid configuration:\n  {}", problems.join("\n  "));
        }
        Ok(Self::new(config))
    }

    /// Read and leniently decode a snapshot file. A full state dump (with
    /// `ui`) is accepted too; `ui` is ignored.
    pub fn read_snapshot(&self, path: &Path) -> anyhow::Result<(FilterState, DecodeReport)> {
        let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let decoded = decode_snapshot(&self.schema, &text, &SystemClock)
            .with_context(|| format!("cannot decode snapshot {}", path.display()))?;
        if !decoded.1.is_clean() {
            tracing::warn!(
                path = %path.display(),
                discarded = decoded.1.discarded.len(),
                "snapshot had unusable fields"
            );
        }
        Ok(decoded)
    }
}
