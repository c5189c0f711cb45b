//! Persistence errors.
//!
//! None of these ever reach the reducer. Write failures are logged and
//! swallowed by the sinks' callers; load failures degrade to "no persisted
//! state" or to per-dimension discards.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by codecs, stores, and sinks.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Filesystem access failed.
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or parsing failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A snapshot is unusable as a whole.
    #[error("unusable snapshot: {0}")]
    Snapshot(String),

    /// A store key cannot be mapped to a file name.
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    /// A sink rejected the write.
    #[error("sink '{sink}' failed: {reason}")]
    Sink {
        /// Sink name.
        sink: String,
        /// Why.
        reason: String,
    },

    /// The debounced writer needs a Tokio runtime.
    #[error("no Tokio runtime available for the debounced writer")]
    NoRuntime,
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
