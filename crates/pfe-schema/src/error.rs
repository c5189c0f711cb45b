//! Schema errors.

use std::fmt;

use thiserror::Error;

/// A single kind-check violation.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// JSON Pointer to the violating location inside the fragment.
    pub instance_path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while consulting or decoding against the table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// The path does not name any dimension in the table.
    #[error("unknown filter dimension '{path}'")]
    UnknownDimension {
        /// The unresolved path.
        path: String,
    },

    /// The JSON fragment does not have the dimension's declared kind.
    #[error("value at '{path}' does not match its declared kind: {}", join_violations(.violations))]
    KindMismatch {
        /// The dimension path.
        path: String,
        /// Structured violations reported by the kind check.
        violations: Vec<Violation>,
    },

    /// The fragment has the right shape but an unusable payload.
    #[error("invalid value at '{path}': {reason}")]
    InvalidValue {
        /// The dimension path.
        path: String,
        /// Why the payload was rejected.
        reason: String,
    },

    /// A kind schema could not be compiled.
    #[error("kind check for '{path}' could not be built: {reason}")]
    CheckerBuild {
        /// The dimension path.
        path: String,
        /// Reason reported by the validator builder.
        reason: String,
    },

    /// The dimension table itself is malformed.
    #[error("invalid dimension table: {0}")]
    InvalidTable(String),
}
