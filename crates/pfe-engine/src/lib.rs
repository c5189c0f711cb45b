//! # pfe-engine: Session-Scoped Filter Engine
//!
//! Wires the reducer, validator, resolver, chart bridge and persistence
//! layer into one object per filtering session.
//!
//! ```text
//!  manual edit ─┐
//!  chart click ─┼─► FilterEngine::dispatch ─► Reducer ─► FilterState ─┬─► watch subscribers
//!  preset ──────┤                                                     └─► DebouncedWriter ─► storage / query
//!  query load ──┘
//! ```
//!
//! Conflict checks run when the caller asks ([`FilterEngine::refresh_conflicts`]
//! or [`FilterEngine::settle`]); the validator itself never dispatches.

pub mod config;
pub mod engine;
pub mod error;
pub mod preset;

pub use config::{ConflictConfig, EngineConfig};
pub use engine::{EditOutcome, EngineBuilder, FilterEngine};
pub use error::{EngineError, PresetError};
pub use preset::{Preset, PresetCatalog};
