//! # Presets Subcommand

use std::path::PathBuf;

use clap::Args;
use pfe_engine::PresetCatalog;
use serde_json::Value;

use crate::context::CliContext;

/// Arguments for `presets`.
#[derive(Args, Debug)]
pub struct PresetsArgs {
    /// Catalog YAML file (defaults to the configured or built-in catalog).
    #[arg(long)]
    pub catalog: Option<PathBuf>,
}

/// List the catalog.
pub fn run(ctx: &CliContext, args: &PresetsArgs) -> anyhow::Result<Value> {
    let catalog = match args.catalog.as_ref().or(ctx.config.preset_catalog.as_ref()) {
        Some(path) => PresetCatalog::load(&ctx.schema, path)?,
        None => PresetCatalog::builtin(&ctx.schema)?,
    };
    Ok(serde_json::to_value(&catalog)?)
}
