//! # Replay Subcommand
//!
//! Folds a JSON array of actions over a starting state. With `--store-dir`
//! the actions run through a full engine backed by a [`FileStore`], so the
//! final state lands in storage the way an interactive session would leave it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use pfe_engine::FilterEngine;
use pfe_persist::{FileStore, MemoryAddressBar};
use pfe_schema::Schema;
use pfe_state::{FilterAction, FilterState, Reducer};
use serde_json::Value;

use crate::context::CliContext;

/// Arguments for `replay`.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON file holding an array of actions.
    pub actions: PathBuf,

    /// Snapshot to start from instead of the initial state.
    #[arg(long)]
    pub from: Option<PathBuf>,

    /// Persist through an engine rooted at this directory.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

/// Replay and return the final state.
pub fn run(ctx: &CliContext, args: &ReplayArgs) -> anyhow::Result<Value> {
    let actions = read_actions(&ctx.schema, &args.actions)?;
    let start = match &args.from {
        Some(path) => Some(ctx.read_snapshot(path)?.0),
        None => None,
    };
    let state = match &args.store_dir {
        Some(dir) => replay_persisted(ctx, dir, start, actions)?,
        None => {
            let reducer = Reducer::with_system_clock(ctx.schema.clone());
            let initial = start.unwrap_or_else(|| reducer.initial_state());
            reducer.reduce_all(&initial, &actions)
        }
    };
    tracing::info!(actions = %args.actions.display(), version = state.version(), "replay complete");
    Ok(serde_json::to_value(&state)?)
}

fn read_actions(schema: &Schema, path: &Path) -> anyhow::Result<Vec<FilterAction>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let json: Value = serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))?;
    let Value::Array(items) = json else {
        anyhow::bail!("{} must hold a JSON array of actions", path.display());
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| FilterAction::from_json(schema, item).with_context(|| format!("action #{i}")))
        .collect()
}

fn replay_persisted(
    ctx: &CliContext,
    dir: &Path,
    start: Option<FilterState>,
    actions: Vec<FilterAction>,
) -> anyhow::Result<FilterState> {
    let mut config = ctx.config.clone();
    config.persistence.query_enabled = false;
    let store = Arc::new(FileStore::new(dir)?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("cannot build runtime")?;
    runtime.block_on(async move {
        let mut engine = FilterEngine::builder(config)
            .schema(ctx.schema.clone())
            .start(store, Arc::new(MemoryAddressBar::default()))?;
        if let Some(state) = start {
            engine.dispatch(FilterAction::LoadState { state: Box::new(state) });
        }
        engine.dispatch_all(actions);
        Ok::<_, anyhow::Error>(engine.shutdown().await)
    })
}
