//! # Query Subcommands
//!
//! `decode-query` and `encode-query`.

use std::path::PathBuf;

use clap::Args;
use pfe_core::SystemClock;
use pfe_persist::{decode_query, encode_query};
use serde_json::{json, Value};

use crate::context::CliContext;

/// Arguments for `decode-query`.
#[derive(Args, Debug)]
pub struct DecodeQueryArgs {
    /// Query string, with or without a leading `?`.
    pub query: String,

    /// Parameter prefix (defaults to the configured one).
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Arguments for `encode-query`.
#[derive(Args, Debug)]
pub struct EncodeQueryArgs {
    /// Snapshot JSON file.
    pub snapshot: PathBuf,

    /// Parameter prefix (defaults to the configured one).
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Decode a query string into filters and metadata.
pub fn decode(ctx: &CliContext, args: &DecodeQueryArgs) -> anyhow::Result<Value> {
    let prefix = args.prefix.as_deref().unwrap_or(&ctx.config.persistence.query_prefix);
    Ok(match decode_query(&ctx.schema, &args.query, prefix, &SystemClock) {
        Some((state, report)) => json!({
            "filters": state.filters,
            "metadata": state.metadata,
            "discarded": report.discarded,
        }),
        None => json!({ "filters": null, "discarded": [] }),
    })
}

/// Encode a snapshot file as a query string.
pub fn encode(ctx: &CliContext, args: &EncodeQueryArgs) -> anyhow::Result<Value> {
    let prefix = args.prefix.as_deref().unwrap_or(&ctx.config.persistence.query_prefix);
    let (state, report) = ctx.read_snapshot(&args.snapshot)?;
    Ok(json!({
        "query": encode_query(&ctx.schema, &state, prefix),
        "discarded": report.discarded,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfe_engine::EngineConfig;

    fn ctx() -> CliContext {
        CliContext::new(EngineConfig::default())
    }

    #[test]
    fn test_decode_reports_bad_params() {
        let out = decode(
            &ctx(),
            &DecodeQueryArgs {
                query: "?f_riskGrades=CM1&f_regions=mars".into(),
                prefix: None,
            },
        )
        .unwrap();
        assert_eq!(out["filters"]["riskGrades"], json!(["CM1"]));
        assert_eq!(out["filters"]["regions"], json!([]));
        assert_eq!(out["metadata"]["source"], "url");
        assert_eq!(out["discarded"][0]["field"], "regions");
    }

    #[test]
    fn test_decode_without_filter_params() {
        let out = decode(
            &ctx(),
            &DecodeQueryArgs {
                query: "page=2".into(),
                prefix: None,
            },
        )
        .unwrap();
        assert!(out["filters"].is_null());
    }

    #[test]
    fn test_encode_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(
            &path,
            r#"{"formatVersion":1,"filters":{"creditLimit":{"min":-0.5,"max":null},"searchQuery":"a b"}}"#,
        )
        .unwrap();
        let out = encode(
            &ctx(),
            &EncodeQueryArgs {
                snapshot: path,
                prefix: Some("q_".into()),
            },
        )
        .unwrap();
        assert_eq!(out["query"], "q_searchQuery=a+b");
        // Out-of-bounds creditLimit and the missing metadata.
        assert_eq!(out["discarded"].as_array().map(Vec::len), Some(2));
    }
}
