//! Engine and preset errors.

use std::path::PathBuf;

use pfe_bridge::BridgeError;
use pfe_persist::PersistenceError;
use thiserror::Error;

/// Errors raised while loading or decoding a preset catalog.
#[derive(Error, Debug)]
pub enum PresetError {
    /// The catalog file could not be read.
    #[error("cannot read preset catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid YAML of the expected shape.
    #[error("invalid preset catalog: {0}")]
    Parse(String),

    /// Two presets share an id.
    #[error("duplicate preset id '{0}'")]
    DuplicateId(String),

    /// A preset names a dimension or value the table rejects.
    #[error("preset '{preset}' has an invalid filter '{path}': {reason}")]
    InvalidFilter {
        /// Preset id.
        preset: String,
        /// Offending key.
        path: String,
        /// Why.
        reason: String,
    },
}

/// Errors raised by the filter engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration failed validation.
    #[error("invalid engine configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// No preset with this id.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    /// Persistence setup failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A chart click could not be translated.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The preset catalog is unusable.
    #[error(transparent)]
    Preset(#[from] PresetError),
}
