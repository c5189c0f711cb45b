//! # pfe-resolve: Conflict Resolver
//!
//! Applies the suggested resolution of every auto-resolvable conflict through
//! the reducer, then removes the conflict from `ui.conflicts`.
//!
//! ## Policy
//!
//! | Suggestion | Dispatched |
//! |------------|-----------|
//! | `remove` | `CLEAR_FILTER`, then `RESOLVE_CONFLICT` |
//! | `modify` / `replace` with `newValue` | `UPDATE_FILTER` (source `manual`), then `RESOLVE_CONFLICT` |
//! | anything on a non-auto conflict | nothing |
//!
//! The resolver is deterministic: identical `(state, conflicts)` input gives
//! identical output, so it can be retried safely.

use pfe_core::{FilterPath, FilterSource};
use pfe_state::{FilterAction, FilterConflict, FilterState, Reducer, ResolutionAction};
use serde::Serialize;

/// Why a conflict was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `autoResolvable` is false.
    NotAutoResolvable,
    /// Auto-resolvable but carries no suggestion.
    NoSuggestion,
    /// `modify`/`replace` without a `newValue`.
    MissingValue,
    /// The suggestion names a path that is not a filter dimension.
    InvalidPath,
    /// The reducer rejected the resulting action.
    Rejected,
    /// Same id already applied earlier in this pass.
    Duplicate,
}

/// A conflict left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedConflict {
    /// Conflict id.
    pub id: String,
    /// Why.
    pub reason: SkipReason,
}

/// What one resolver pass did.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    /// Ids applied, in input order.
    pub applied: Vec<String>,
    /// Ids skipped, in input order.
    pub skipped: Vec<SkippedConflict>,
}

/// Resolves conflicts by dispatching through a [`Reducer`].
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    reducer: Reducer,
}

impl ConflictResolver {
    /// A resolver dispatching through `reducer`.
    pub fn new(reducer: Reducer) -> Self {
        Self { reducer }
    }

    /// The reducer in use.
    pub fn reducer(&self) -> &Reducer {
        &self.reducer
    }

    /// Apply every auto-resolvable suggestion in `conflicts`.
    pub fn resolve(&self, state: &FilterState, conflicts: &[FilterConflict]) -> FilterState {
        self.resolve_with_report(state, conflicts).0
    }

    /// [`resolve`](Self::resolve), also reporting what was applied and skipped.
    pub fn resolve_with_report(
        &self,
        state: &FilterState,
        conflicts: &[FilterConflict],
    ) -> (FilterState, ResolutionReport) {
        let mut current = state.clone();
        let mut report = ResolutionReport::default();
        for conflict in conflicts {
            match self.apply_one(&current, conflict, &report) {
                Ok(next) => {
                    tracing::debug!(id = %conflict.id, "conflict auto-resolved");
                    current = next;
                    report.applied.push(conflict.id.clone());
                }
                Err(reason) => {
                    tracing::debug!(id = %conflict.id, ?reason, "conflict left for the user");
                    report.skipped.push(SkippedConflict {
                        id: conflict.id.clone(),
                        reason,
                    });
                }
            }
        }
        (current, report)
    }

    fn apply_one(
        &self,
        state: &FilterState,
        conflict: &FilterConflict,
        report: &ResolutionReport,
    ) -> Result<FilterState, SkipReason> {
        if !conflict.auto_resolvable {
            return Err(SkipReason::NotAutoResolvable);
        }
        if report.applied.contains(&conflict.id) {
            return Err(SkipReason::Duplicate);
        }
        let suggestion = conflict
            .suggested_resolution
            .as_ref()
            .ok_or(SkipReason::NoSuggestion)?;
        let path = FilterPath::new(suggestion.filter_type.clone()).map_err(|_| SkipReason::InvalidPath)?;
        if self.reducer.schema().resolve(&path).is_none() {
            return Err(SkipReason::InvalidPath);
        }
        let action = match suggestion.action {
            ResolutionAction::Remove => FilterAction::clear(path),
            ResolutionAction::Modify | ResolutionAction::Replace => {
                let value = suggestion.new_value.clone().ok_or(SkipReason::MissingValue)?;
                FilterAction::update(path, value, FilterSource::Manual)
            }
        };
        let next = self.reducer.reduce(state, &action);
        if next.version() == state.version() {
            return Err(SkipReason::Rejected);
        }
        Ok(self.reducer.reduce(
            &next,
            &FilterAction::ResolveConflict {
                conflict_id: conflict.id.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use pfe_core::{FixedClock, Timestamp};
    use pfe_schema::{FilterValue, Schema};
    use pfe_state::{ConflictSeverity, ConflictType, SuggestedResolution};
    use pfe_validate::{validate_combination, CombinationContext};

    fn path(s: &str) -> FilterPath {
        FilterPath::new(s).unwrap()
    }

    fn resolver() -> ConflictResolver {
        let clock = FixedClock::new(Timestamp::parse("2025-01-15T09:30:00Z").unwrap());
        ConflictResolver::new(Reducer::new(Arc::new(Schema::portfolio()), Arc::new(clock)))
    }

    fn surfaced(r: &Reducer, state: &FilterState, conflicts: &[FilterConflict]) -> FilterState {
        let adds: Vec<FilterAction> = conflicts
            .iter()
            .map(|c| FilterAction::AddConflict { conflict: c.clone() })
            .collect();
        r.reduce_all(state, &adds)
    }

    fn grade_revenue_state(r: &Reducer) -> FilterState {
        r.reduce_all(
            &r.initial_state(),
            &[
                FilterAction::update(path("riskGrades"), FilterValue::list(["CM1"]), FilterSource::Manual),
                FilterAction::update(
                    path("financialMetrics.revenue"),
                    FilterValue::range(Some(0.0), Some(50.0)),
                    FilterSource::Manual,
                ),
            ],
        )
    }

    #[test]
    fn test_contradiction_cleared_and_removed() {
        let res = resolver();
        let r = res.reducer();
        let base = grade_revenue_state(r);
        let conflicts = validate_combination(r.schema(), &base, &CombinationContext::default());
        assert_eq!(conflicts.len(), 1);
        let state = surfaced(r, &base, &conflicts);

        let (out, report) = res.resolve_with_report(&state, &conflicts);
        assert_eq!(report.applied, vec![conflicts[0].id.clone()]);
        assert!(out.ui.conflicts.is_empty());
        assert_eq!(
            out.filters.get(&path("financialMetrics.revenue")),
            Some(&FilterValue::range(None, None))
        );
        assert_eq!(out.filters.get(&path("riskGrades")), Some(&FilterValue::list(["CM1"])));
        assert_eq!(out.version(), state.version() + 1);
        assert!(validate_combination(r.schema(), &out, &CombinationContext::default()).is_empty());
    }

    #[test]
    fn test_non_auto_conflicts_untouched() {
        let res = resolver();
        let r = res.reducer();
        let base = r.reduce_all(
            &r.initial_state(),
            &[
                FilterAction::update(path("listingStatus"), FilterValue::list(["unlisted"]), FilterSource::Manual),
                FilterAction::update(path("creditRatings"), FilterValue::list(["AA"]), FilterSource::Manual),
            ],
        );
        let conflicts = validate_combination(r.schema(), &base, &CombinationContext::default());
        let state = surfaced(r, &base, &conflicts);
        for _ in 0..3 {
            let (out, report) = res.resolve_with_report(&state, &conflicts);
            assert_eq!(out, state);
            assert!(report.applied.is_empty());
            assert_eq!(report.skipped[0].reason, SkipReason::NotAutoResolvable);
        }
    }

    #[test]
    fn test_deterministic() {
        let res = resolver();
        let r = res.reducer();
        let base = grade_revenue_state(r);
        let conflicts = validate_combination(r.schema(), &base, &CombinationContext::default());
        let state = surfaced(r, &base, &conflicts);
        assert_eq!(res.resolve(&state, &conflicts), res.resolve(&state, &conflicts));
    }

    #[test]
    fn test_replace_with_new_value() {
        let res = resolver();
        let r = res.reducer();
        let conflict = FilterConflict {
            id: "contradiction-manual".into(),
            conflict_type: ConflictType::Contradiction,
            filters: vec!["creditLimit".into()],
            message: "m".into(),
            severity: ConflictSeverity::Medium,
            auto_resolvable: true,
            suggested_resolution: Some(SuggestedResolution {
                action: ResolutionAction::Replace,
                filter_type: "creditLimit".into(),
                new_value: Some(FilterValue::range(Some(10.0), Some(20.0))),
            }),
        };
        let out = res.resolve(&r.initial_state(), std::slice::from_ref(&conflict));
        assert_eq!(
            out.filters.get(&path("creditLimit")),
            Some(&FilterValue::range(Some(10.0), Some(20.0)))
        );

        let mut missing = conflict;
        if let Some(s) = missing.suggested_resolution.as_mut() {
            s.new_value = None;
        }
        let (_, report) = res.resolve_with_report(&r.initial_state(), &[missing]);
        assert_eq!(report.skipped[0].reason, SkipReason::MissingValue);
    }

    #[test]
    fn test_unknown_suggestion_path_skipped() {
        let res = resolver();
        let conflict = FilterConflict {
            id: "x".into(),
            conflict_type: ConflictType::Contradiction,
            filters: vec![],
            message: "m".into(),
            severity: ConflictSeverity::Medium,
            auto_resolvable: true,
            suggested_resolution: Some(SuggestedResolution {
                action: ResolutionAction::Remove,
                filter_type: "colour".into(),
                new_value: None,
            }),
        };
        let state = res.reducer().initial_state();
        let (out, report) = res.resolve_with_report(&state, &[conflict]);
        assert_eq!(out, state);
        assert_eq!(report.skipped[0].reason, SkipReason::InvalidPath);
    }
}
