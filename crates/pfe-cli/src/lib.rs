//! # pfe-cli: Portfolio Filter Command-Line Interface
//!
//! Offline tooling over the filter engine's wire formats. Every subcommand
//! prints pretty JSON on stdout; logs go to stderr (`RUST_LOG`).
//!
//! ## Subcommands
//!
//! - `decode-query`: query string to state, with discarded parameters
//! - `encode-query`: snapshot file to query string
//! - `check`: field and combination checks on a snapshot, optionally auto-resolving
//! - `replay`: reduce a JSON array of actions, optionally persisting through a session store
//! - `presets`: list the preset catalog
//!
//! ## Crate Policy
//!
//! - Argument parsing lives beside each handler; handlers return
//!   `serde_json::Value` and never print.
//! - No filter semantics here: handlers delegate to the library crates.

pub mod check;
pub mod context;
pub mod presets;
pub mod query;
pub mod replay;

pub use context::CliContext;
