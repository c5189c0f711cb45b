//! # Filter Engine
//!
//! One engine per filtering session. It owns the current [`FilterState`],
//! the reducer that transforms it, the debounced writer that mirrors it, and
//! a `watch` channel that publishes every new state to subscribers.
//!
//! ## Dispatch
//!
//! Every mutation goes through [`FilterEngine::dispatch`], which takes
//! `&mut self`: the borrow checker serialises dispatches, so no two
//! transitions can interleave. After each dispatch:
//!
//! 1. the new state is published to subscribers if it differs;
//! 2. if the version moved, the state is queued for persistence.
//!
//! UI-only transitions (errors, conflicts, loading flag) are published but
//! never persisted.
//!
//! ## Lifecycle
//!
//! [`start`](EngineBuilder::start) rehydrates from the address bar or
//! storage (or starts empty), and [`shutdown`](FilterEngine::shutdown)
//! performs a final write before the engine is discarded.

use std::sync::Arc;

use pfe_bridge::{translate_click, ChartFilterTrigger};
use pfe_core::{Clock, FilterPath, FilterSource, SessionId, SystemClock};
use pfe_persist::{load_state, sinks_for, AddressBar, DebouncedWriter, LoadedState, StateStore};
use pfe_resolve::{ConflictResolver, ResolutionReport};
use pfe_schema::{FilterValue, Schema};
use pfe_state::{update_if_changed, FilterAction, FilterConflict, FilterState, Reducer};
use pfe_validate::{
    conflict_id, sanitize_field, validate_combination, validate_field, CombinationContext, FieldValidation,
};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::preset::PresetCatalog;

/// What [`FilterEngine::apply_edit`] did with an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// The value after sanitisation.
    pub value: FilterValue,
    /// Field validation of the sanitised value.
    pub validation: FieldValidation,
    /// Whether the value was written (false when invalid or unchanged).
    pub applied: bool,
}

/// Assembles a [`FilterEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    schema: Option<Arc<Schema>>,
    clock: Option<Arc<dyn Clock>>,
    presets: Option<PresetCatalog>,
    session: Option<SessionId>,
}

impl EngineBuilder {
    /// Use `schema` instead of the portfolio table.
    pub fn schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `presets` instead of the configured or built-in catalog.
    pub fn presets(mut self, presets: PresetCatalog) -> Self {
        self.presets = Some(presets);
        self
    }

    /// Use a known session id.
    pub fn session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Rehydrate and start. Must be called inside a Tokio runtime.
    pub fn start(self, store: Arc<dyn StateStore>, bar: Arc<dyn AddressBar>) -> Result<FilterEngine, EngineError> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            return Err(EngineError::InvalidConfig(problems));
        }
        let schema = self.schema.unwrap_or_else(|| Arc::new(Schema::portfolio()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let presets = match (self.presets, &self.config.preset_catalog) {
            (Some(p), _) => p,
            (None, Some(path)) => PresetCatalog::load(&schema, path)?,
            (None, None) => PresetCatalog::builtin(&schema)?,
        };

        let sinks = sinks_for(&self.config.persistence, schema.clone(), store.clone(), bar.clone());
        let writer = DebouncedWriter::spawn(sinks, self.config.persistence.debounce())?;

        let reducer = Reducer::new(schema.clone(), clock.clone());
        let loaded = load_state(
            &self.config.persistence,
            &schema,
            store.as_ref(),
            bar.as_ref(),
            clock.as_ref(),
        );
        let state = match &loaded {
            Some(l) => l.state.clone(),
            None => reducer.initial_state(),
        };
        let session = self.session.unwrap_or_default();
        tracing::info!(
            %session,
            origin = ?loaded.as_ref().map(|l| l.origin),
            version = state.version(),
            "filter engine started"
        );

        let (tx, _) = watch::channel(state.clone());
        Ok(FilterEngine {
            session,
            resolver: ConflictResolver::new(reducer.clone()),
            reducer,
            presets,
            config: self.config,
            state,
            loaded,
            writer,
            tx,
        })
    }
}

/// A session-scoped filter engine.
pub struct FilterEngine {
    session: SessionId,
    reducer: Reducer,
    resolver: ConflictResolver,
    presets: PresetCatalog,
    config: EngineConfig,
    state: FilterState,
    loaded: Option<LoadedState>,
    writer: DebouncedWriter,
    tx: watch::Sender<FilterState>,
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("session", &self.session)
            .field("version", &self.state.version())
            .field("writer", &self.writer)
            .finish_non_exhaustive()
    }
}

impl FilterEngine {
    /// A builder over `config`.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            schema: None,
            clock: None,
            presets: None,
            session: None,
        }
    }

    /// Start with the portfolio table, the system clock, and the configured
    /// preset catalog.
    pub fn start(
        config: EngineConfig,
        store: Arc<dyn StateStore>,
        bar: Arc<dyn AddressBar>,
    ) -> Result<Self, EngineError> {
        Self::builder(config).start(store, bar)
    }

    // ─── Accessors ───────────────────────────────────────────────────

    /// The current state.
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// The session id.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The dimension table.
    pub fn schema(&self) -> &Schema {
        self.reducer.schema()
    }

    /// The preset catalog.
    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// How the session was rehydrated, if it was.
    pub fn loaded(&self) -> Option<&LoadedState> {
        self.loaded.as_ref()
    }

    /// Counters of the persistence writer.
    pub fn writer_stats(&self) -> pfe_persist::WriterStats {
        self.writer.stats()
    }

    /// A receiver that sees every published state, starting with the
    /// current one.
    pub fn subscribe(&self) -> watch::Receiver<FilterState> {
        self.tx.subscribe()
    }

    // ─── Dispatch ────────────────────────────────────────────────────

    /// Reduce `action` into the current state.
    pub fn dispatch(&mut self, action: FilterAction) -> &FilterState {
        let next = self.reducer.reduce(&self.state, &action);
        tracing::trace!(action = action.type_name(), version = next.version(), "dispatched");
        self.commit(next);
        &self.state
    }

    /// Dispatch several actions in order.
    pub fn dispatch_all(&mut self, actions: impl IntoIterator<Item = FilterAction>) -> &FilterState {
        for action in actions {
            self.dispatch(action);
        }
        &self.state
    }

    fn commit(&mut self, next: FilterState) {
        if next == self.state {
            return;
        }
        let persist = next.version() != self.state.version();
        self.state = next;
        self.tx.send_replace(self.state.clone());
        if persist {
            self.writer.save(&self.state);
        }
    }

    // ─── Edit origins ────────────────────────────────────────────────

    /// A manual or search edit: sanitise, validate, then write.
    ///
    /// An invalid value is not written; each of its errors is added to
    /// `ui.errors`. Warnings are added alongside a successful write. An
    /// unchanged value is not written and does not bump the version.
    pub fn apply_edit(&mut self, path: FilterPath, value: FilterValue, source: FilterSource) -> EditOutcome {
        let schema = self.reducer.schema();
        let value = sanitize_field(schema, &path, &value);
        let validation = validate_field(schema, &path, &value);
        let add_errors: Vec<FilterAction> = validation
            .errors
            .iter()
            .cloned()
            .map(|error| FilterAction::AddError { error })
            .collect();

        if !validation.is_valid {
            tracing::debug!(%path, errors = validation.errors.len(), "edit rejected by field validation");
            self.dispatch_all(add_errors);
            return EditOutcome {
                value,
                validation,
                applied: false,
            };
        }

        let before = self.state.version();
        let next = update_if_changed(&self.reducer, &self.state, path, value.clone(), source);
        self.commit(next);
        self.dispatch_all(add_errors);
        EditOutcome {
            value,
            validation,
            applied: self.state.version() != before,
        }
    }

    /// Merge preset `id` with source `preset`.
    pub fn apply_preset(&mut self, id: &str) -> Result<&FilterState, EngineError> {
        let preset = self
            .presets
            .get(id)
            .ok_or_else(|| EngineError::UnknownPreset(id.to_string()))?;
        let action = FilterAction::MergeFilters {
            filters: preset.filters.clone(),
            source: FilterSource::Preset,
        };
        tracing::debug!(preset = id, "applying preset");
        Ok(self.dispatch(action))
    }

    /// Translate and apply a chart click. A click that changes nothing is
    /// not dispatched.
    pub fn handle_chart_click(&mut self, trigger: &ChartFilterTrigger) -> Result<&FilterState, EngineError> {
        let action = translate_click(self.reducer.schema(), &self.state, trigger)?;
        if let FilterAction::UpdateFilter { filter_type, value, .. } = &action {
            if self.state.filters.get(filter_type) == Some(value) {
                return Ok(&self.state);
            }
        }
        Ok(self.dispatch(action))
    }

    // ─── Conflicts ───────────────────────────────────────────────────

    /// A combination context from the configured thresholds.
    pub fn combination_context(&self, estimate: Option<u64>) -> CombinationContext {
        self.config.combination_context(estimate)
    }

    /// Re-run combination checks and surface conflicts whose ids are not
    /// already in `ui.conflicts`. Nothing is removed. Returns the detected
    /// conflicts.
    pub fn refresh_conflicts(&mut self, context: &CombinationContext) -> Vec<FilterConflict> {
        let detected = validate_combination(self.reducer.schema(), &self.state, context);
        let fresh: Vec<FilterAction> = detected
            .iter()
            .filter(|c| !self.state.has_conflict(&c.id))
            .map(|c| FilterAction::AddConflict { conflict: c.clone() })
            .collect();
        self.dispatch_all(fresh);
        detected
    }

    /// Resolve every surfaced validator conflict that is no longer detected
    /// under `context`. Conflicts whose ids were not derived by the
    /// validator, such as host-raised ones, are kept. Returns the resolved ids.
    pub fn expire_conflicts(&mut self, context: &CombinationContext) -> Vec<String> {
        let detected = validate_combination(self.reducer.schema(), &self.state, context);
        let checked = |c: &FilterConflict| conflict_id(c.conflict_type, &c.filters) == c.id;
        let stale: Vec<String> = self
            .state
            .ui
            .conflicts
            .iter()
            .filter(|c| checked(c) && !detected.iter().any(|d| d.id == c.id))
            .map(|c| c.id.clone())
            .collect();
        self.dispatch_all(stale.iter().map(|id| FilterAction::ResolveConflict {
            conflict_id: id.clone(),
        }));
        stale
    }

    /// Apply every auto-resolvable surfaced conflict.
    pub fn auto_resolve(&mut self) -> ResolutionReport {
        let conflicts = self.state.ui.conflicts.clone();
        let (next, report) = self.resolver.resolve_with_report(&self.state, &conflicts);
        if !report.applied.is_empty() {
            tracing::info!(applied = report.applied.len(), "conflicts auto-resolved");
        }
        self.commit(next);
        report
    }

    /// Refresh conflicts and, when configured, auto-resolve and refresh
    /// again. Returns the conflicts left surfaced.
    pub fn settle(&mut self, context: &CombinationContext) -> Vec<FilterConflict> {
        self.refresh_conflicts(context);
        if self.config.conflicts.auto_resolve {
            let report = self.auto_resolve();
            if !report.applied.is_empty() {
                self.refresh_conflicts(context);
            }
        }
        self.state.ui.conflicts.clone()
    }

    // ─── Persistence ─────────────────────────────────────────────────

    /// Write any pending state now.
    pub async fn flush(&self) {
        self.writer.flush_now().await;
    }

    /// Drop any pending write without performing it. Later changes are
    /// persisted as usual.
    pub fn cancel_pending(&self) {
        self.writer.discard();
    }

    /// Final write of the current state, then stop the writer.
    pub async fn shutdown(self) -> FilterState {
        self.writer.save(&self.state);
        self.writer.close().await;
        tracing::info!(session = %self.session, version = self.state.version(), "filter engine stopped");
        self.state
    }
}
