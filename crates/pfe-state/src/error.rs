//! State errors.

use pfe_core::PfeError;
use pfe_schema::{SchemaError, ValueKind};
use thiserror::Error;

/// Errors raised while addressing or decoding filter state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The path names no dimension in the table.
    #[error("unknown filter dimension '{path}'")]
    UnknownPath {
        /// The unresolved path.
        path: String,
    },

    /// A group member was addressed where only top-level dimensions are
    /// accepted.
    #[error("'{path}' is not a top-level dimension")]
    NotTopLevel {
        /// The nested path.
        path: String,
    },

    /// A value of the wrong kind was supplied for a dimension.
    #[error("'{path}' holds {expected} values, got {found}")]
    KindMismatch {
        /// The dimension path.
        path: String,
        /// Declared kind.
        expected: ValueKind,
        /// Supplied kind.
        found: ValueKind,
    },

    /// A JSON action or state could not be decoded.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// What was being decoded.
        what: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A schema-directed decode failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A core primitive failed.
    #[error(transparent)]
    Core(#[from] PfeError),
}

impl StateError {
    pub(crate) fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            reason: reason.into(),
        }
    }
}
