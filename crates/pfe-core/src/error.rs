//! # Error Types
//!
//! Shared error types for the filter engine. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! Component crates define their own error enums (schema, persistence,
//! bridge, engine) and wrap these where a core primitive fails.

use thiserror::Error;

/// Top-level error type for core primitives.
#[derive(Error, Debug)]
pub enum PfeError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// A dotted filter path was malformed.
    #[error("invalid filter path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path text.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// A timestamp or date could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An unknown source tag was supplied.
    #[error("unknown filter source: {0:?}")]
    UnknownSource(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
