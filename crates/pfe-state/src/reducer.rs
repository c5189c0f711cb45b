//! # Reducer
//!
//! `reduce(state, action) -> state`. Pure apart from reading the injected
//! clock, never panics, and never fails: an action that cannot apply leaves
//! the state unchanged (a kind mismatch additionally records a UI error).
//!
//! ## Version rules
//!
//! - Mutating actions bump `metadata.version` by exactly one.
//! - UI-only actions and no-ops leave it alone.
//! - `LOAD_STATE` takes the incoming version verbatim.

use std::sync::Arc;

use pfe_core::{Clock, FilterPath, FilterSource, SystemClock};
use pfe_schema::{FilterValue, Schema};

use crate::action::FilterAction;
use crate::error::StateError;
use crate::filters::FilterSet;
use crate::state::{FilterError, FilterState, Touch, UiState};

/// Code recorded when an action carries a value of the wrong kind.
pub const KIND_MISMATCH: &str = "KIND_MISMATCH";

/// Applies [`FilterAction`]s against a dimension table.
#[derive(Debug, Clone)]
pub struct Reducer {
    schema: Arc<Schema>,
    clock: Arc<dyn Clock>,
}

impl Reducer {
    /// A reducer reading time from `clock`.
    pub fn new(schema: Arc<Schema>, clock: Arc<dyn Clock>) -> Self {
        Self { schema, clock }
    }

    /// A reducer on the wall clock.
    pub fn with_system_clock(schema: Arc<Schema>) -> Self {
        Self::new(schema, Arc::new(SystemClock))
    }

    /// The dimension table.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shared handle to the dimension table.
    pub fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// The injected clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Fresh empty state at version 1.
    pub fn initial_state(&self) -> FilterState {
        FilterState::initial(&self.schema, self.clock.now())
    }

    /// Apply one action.
    pub fn reduce(&self, state: &FilterState, action: &FilterAction) -> FilterState {
        let mut next = state.clone();
        match action {
            FilterAction::UpdateFilter {
                filter_type,
                value,
                source,
            } => {
                let source = source.unwrap_or_default();
                match next.filters.set(&self.schema, filter_type, value.clone()) {
                    Ok(()) => self.stamp(&mut next, &[filter_type.clone()], source),
                    Err(err) => return self.rejected(state, action, err),
                }
            }
            FilterAction::ClearFilter { filter_type, source } => {
                match next.filters.clear(&self.schema, filter_type) {
                    Ok(()) => {
                        let source = source.unwrap_or(next.metadata.source);
                        self.stamp(&mut next, &[filter_type.clone()], source);
                    }
                    Err(err) => return self.rejected(state, action, err),
                }
            }
            FilterAction::ClearAllFilters => {
                next.filters = FilterSet::defaults(&self.schema);
                next.ui = UiState::default();
                next.metadata.touched.clear();
                let source = next.metadata.source;
                self.stamp(&mut next, &[], source);
            }
            FilterAction::LoadState { state: incoming } => {
                if !incoming.filters.conforms(&self.schema) {
                    tracing::warn!("LOAD_STATE carries filters that do not match the table; ignored");
                    next.ui.errors.push(FilterError::error(
                        "*",
                        KIND_MISMATCH,
                        "loaded state does not match the filter table",
                    ));
                    return next;
                }
                next = (**incoming).clone();
                next.metadata.applied_at = self.clock.now();
            }
            FilterAction::SetLoading { is_loading } => next.ui.is_loading = *is_loading,
            FilterAction::AddError { error } => next.ui.errors.push(error.clone()),
            FilterAction::ClearErrors => next.ui.errors.clear(),
            FilterAction::AddConflict { conflict } => {
                if next.has_conflict(&conflict.id) {
                    tracing::debug!(id = %conflict.id, "conflict already surfaced");
                } else {
                    next.ui.conflicts.push(conflict.clone());
                }
            }
            FilterAction::ResolveConflict { conflict_id } => {
                next.ui.conflicts.retain(|c| &c.id != conflict_id);
            }
            FilterAction::MergeFilters { filters, source } => {
                let mut applied = Vec::new();
                let mut failures = Vec::new();
                for (key, value) in filters {
                    let result = FilterPath::new(key.clone())
                        .map_err(StateError::from)
                        .and_then(|path| {
                            if path.is_nested() {
                                return Err(StateError::NotTopLevel { path: key.clone() });
                            }
                            next.filters
                                .set(&self.schema, &path, value.clone())
                                .map(|()| path)
                        });
                    match result {
                        Ok(path) => applied.push(path),
                        Err(err) => failures.push(err),
                    }
                }
                if applied.is_empty() && !failures.is_empty() {
                    let mut out = state.clone();
                    for err in failures {
                        record_failure(&mut out, action, err);
                    }
                    return out;
                }
                for err in failures {
                    record_failure(&mut next, action, err);
                }
                self.stamp(&mut next, &applied, *source);
            }
            FilterAction::Unrecognized { action_type } => {
                tracing::debug!(%action_type, "unrecognized action ignored");
            }
        }
        next
    }

    /// Apply actions in order.
    pub fn reduce_all<'a>(
        &self,
        state: &FilterState,
        actions: impl IntoIterator<Item = &'a FilterAction>,
    ) -> FilterState {
        actions
            .into_iter()
            .fold(state.clone(), |acc, action| self.reduce(&acc, action))
    }

    fn stamp(&self, state: &mut FilterState, paths: &[FilterPath], source: FilterSource) {
        let now = self.clock.now();
        let meta = &mut state.metadata;
        meta.version += 1;
        meta.source = source;
        meta.last_updated = now;
        for path in paths {
            meta.touched.insert(
                path.clone(),
                Touch {
                    source,
                    version: meta.version,
                },
            );
        }
    }

    fn rejected(&self, state: &FilterState, action: &FilterAction, err: StateError) -> FilterState {
        let mut out = state.clone();
        record_failure(&mut out, action, err);
        out
    }
}

fn record_failure(state: &mut FilterState, action: &FilterAction, err: StateError) {
    match err {
        StateError::KindMismatch { ref path, .. } => {
            tracing::debug!(action = action.type_name(), %err, "value rejected");
            state
                .ui
                .errors
                .push(FilterError::error(path.clone(), KIND_MISMATCH, err.to_string()));
        }
        other => {
            tracing::debug!(action = action.type_name(), error = %other, "action ignored");
        }
    }
}

/// Replace a dimension value only when it differs, for callers that want to
/// avoid a version bump on a no-change edit.
pub fn update_if_changed(
    reducer: &Reducer,
    state: &FilterState,
    path: FilterPath,
    value: FilterValue,
    source: FilterSource,
) -> FilterState {
    if state.filters.get(&path) == Some(&value) {
        return state.clone();
    }
    reducer.reduce(state, &FilterAction::update(path, value, source))
}
