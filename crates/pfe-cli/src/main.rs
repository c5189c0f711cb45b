//! # pfe CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules. Every
//! subcommand prints one JSON document on stdout; logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use pfe_cli::{check, presets, query, replay, CliContext};

/// Portfolio filter state toolkit.
///
/// Decodes and encodes filter query strings, checks snapshots for field
/// errors and cross-filter conflicts, replays action logs and lists presets.
#[derive(Parser, Debug)]
#[command(name = "pfe", version, about)]
struct Cli {
    /// Engine configuration file (YAML). `PFE_*` variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Decode a query string into filters.
    DecodeQuery(query::DecodeQueryArgs),
    /// Encode a snapshot as a query string.
    EncodeQuery(query::EncodeQueryArgs),
    /// Validate fields and detect conflicts in a snapshot.
    Check(check::CheckArgs),
    /// Fold an action log over a state.
    Replay(replay::ReplayArgs),
    /// List the preset catalog.
    Presets(presets::PresetsArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config.as_deref())?;

    let output = match &cli.command {
        Commands::DecodeQuery(args) => query::decode(&ctx, args)?,
        Commands::EncodeQuery(args) => query::encode(&ctx, args)?,
        Commands::Check(args) => check::run(&ctx, args)?,
        Commands::Replay(args) => replay::run(&ctx, args)?,
        Commands::Presets(args) => presets::run(&ctx, args)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
