//! # pfe-state: Filter State and the Reducer
//!
//! The state of one filtering session and the only way it changes.
//!
//! - [`filters`]: `FilterSet`, always complete, addressed by dotted path
//!   through the schema table.
//! - [`state`]: `FilterState`, metadata, and the transient UI state
//!   (field errors and cross-field conflicts).
//! - [`action`]: the `FilterAction` protocol and its JSON wire form.
//! - [`reducer`]: the pure transition function.
//!
//! ## Invariants
//!
//! 1. Every dimension always holds a value of its declared kind.
//! 2. `metadata.version` grows by exactly one per mutating action.
//! 3. Editing a group member never touches its siblings.
//! 4. `ui.errors` and `ui.conflicts` are only removed by `CLEAR_ERRORS`,
//!    `RESOLVE_CONFLICT` or `CLEAR_ALL_FILTERS`.

pub mod action;
pub mod error;
pub mod filters;
pub mod reducer;
pub mod state;

pub use action::FilterAction;
pub use error::StateError;
pub use filters::{FilterSet, RejectedDimension};
pub use reducer::{update_if_changed, Reducer, KIND_MISMATCH};
pub use state::{
    ConflictSeverity, ConflictType, ErrorSeverity, FilterConflict, FilterError, FilterState,
    Metadata, ResolutionAction, SuggestedResolution, Touch, UiState,
};
