//! # Check Subcommand
//!
//! Field and combination checks over a snapshot, with an optional
//! auto-resolution pass.

use std::path::PathBuf;

use clap::Args;
use pfe_core::FilterPath;
use pfe_resolve::ConflictResolver;
use pfe_state::{FilterAction, FilterError, Reducer};
use pfe_validate::{validate_combination, validate_field};
use serde_json::{json, Value};

use crate::context::CliContext;

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Snapshot JSON file.
    pub snapshot: PathBuf,

    /// Result count estimate from the query layer.
    #[arg(long)]
    pub estimated_count: Option<u64>,

    /// Apply auto-resolvable suggestions and report the outcome.
    #[arg(long)]
    pub resolve: bool,
}

/// Run the checks.
pub fn run(ctx: &CliContext, args: &CheckArgs) -> anyhow::Result<Value> {
    let (state, report) = ctx.read_snapshot(&args.snapshot)?;
    let schema = ctx.schema.as_ref();

    let mut field_errors: Vec<FilterError> = Vec::new();
    for dim in schema.dimensions() {
        let path = FilterPath::new(dim.name.clone())?;
        if let Some(value) = state.filters.get(&path) {
            field_errors.extend(validate_field(schema, &path, value).errors);
        }
    }

    let context = ctx.config.combination_context(args.estimated_count);
    let conflicts = validate_combination(schema, &state, &context);
    let mut out = json!({
        "version": state.version(),
        "discarded": report.discarded,
        "fieldErrors": field_errors,
        "conflicts": conflicts,
    });

    if args.resolve {
        let reducer = Reducer::with_system_clock(ctx.schema.clone());
        let adds: Vec<FilterAction> = conflicts
            .iter()
            .map(|c| FilterAction::AddConflict { conflict: c.clone() })
            .collect();
        let surfaced = reducer.reduce_all(&state, &adds);
        let resolver = ConflictResolver::new(reducer);
        let (resolved, resolution) = resolver.resolve_with_report(&surfaced, &conflicts);
        out["resolution"] = json!({
            "applied": resolution.applied,
            "skipped": resolution.skipped,
            "version": resolved.version(),
            "filters": resolved.filters,
            "remaining": validate_combination(schema, &resolved, &context),
        });
    }
    Ok(out)
}
