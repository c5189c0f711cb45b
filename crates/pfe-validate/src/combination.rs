//! # Cross-field Conflict Detection
//!
//! `validate_combination` evaluates a fixed rule set over the *active*
//! (non-empty) dimensions of a state and returns the conflicts it finds.
//! It never dispatches; surfacing conflicts is the caller's decision.
//!
//! | Type | Severity | Auto | Suggestion |
//! |------|----------|------|------------|
//! | exclusion | high | no | remove the more recently touched |
//! | contradiction | medium | yes | remove the more recently touched |
//! | performance | low | no | none |
//! | data_availability | high (0) / medium (< threshold) | no | remove the most recently touched |
//!
//! Output order is rule order, then table order. Conflict ids depend only on
//! the conflict type and the sorted involved paths.

use std::cmp::Reverse;

use pfe_core::{short_digest, CanonicalBytes, FilterPath};
use pfe_schema::{Schema, SEARCH_DIMENSION};
use pfe_state::{
    ConflictSeverity, ConflictType, FilterConflict, FilterState, ResolutionAction,
    SuggestedResolution,
};
use serde_json::json;

use crate::rules::{ContradictionRule, ExclusionRule, CONTRADICTIONS, EXCLUSIONS};

/// Caller-supplied facts and thresholds for combination checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationContext {
    /// Estimated result count from the query layer, if known.
    pub estimated_result_count: Option<u64>,
    /// Active high-cardinality dimensions tolerated alongside free-text search.
    pub performance_threshold: usize,
    /// Counts below this are near-empty.
    pub near_empty_threshold: u64,
}

impl Default for CombinationContext {
    fn default() -> Self {
        Self {
            estimated_result_count: None,
            performance_threshold: 3,
            near_empty_threshold: 10,
        }
    }
}

impl CombinationContext {
    /// Default thresholds with a known result estimate.
    pub fn with_estimate(count: u64) -> Self {
        Self {
            estimated_result_count: Some(count),
            ..Self::default()
        }
    }
}

/// Deterministic conflict id: `{type}-{16 hex}` over the canonical form of
/// the type and the sorted involved paths.
pub fn conflict_id(conflict_type: ConflictType, filters: &[String]) -> String {
    let mut sorted = filters.to_vec();
    sorted.sort();
    sorted.dedup();
    let payload = json!({ "type": conflict_type.as_str(), "filters": sorted });
    match CanonicalBytes::new(&payload) {
        Ok(bytes) => format!("{}-{}", conflict_type.as_str(), short_digest(&bytes, 16)),
        Err(err) => {
            tracing::warn!(%err, "conflict id canonicalization failed");
            format!("{}-{}", conflict_type.as_str(), sorted.join("+"))
        }
    }
}

/// Evaluate every rule against `state`.
pub fn validate_combination(
    schema: &Schema,
    state: &FilterState,
    context: &CombinationContext,
) -> Vec<FilterConflict> {
    let mut conflicts = Vec::new();
    for rule in EXCLUSIONS {
        conflicts.extend(check_exclusion(state, rule));
    }
    for rule in CONTRADICTIONS {
        conflicts.extend(check_contradiction(state, rule));
    }
    conflicts.extend(check_performance(schema, state, context));
    conflicts.extend(check_availability(schema, state, context));
    conflicts
}

fn build(
    conflict_type: ConflictType,
    mut filters: Vec<String>,
    message: String,
    severity: ConflictSeverity,
    auto_resolvable: bool,
    remove: Option<&FilterPath>,
) -> FilterConflict {
    filters.sort();
    filters.dedup();
    FilterConflict {
        id: conflict_id(conflict_type, &filters),
        conflict_type,
        filters,
        message,
        severity,
        auto_resolvable,
        suggested_resolution: remove.map(|p| SuggestedResolution {
            action: ResolutionAction::Remove,
            filter_type: p.to_string(),
            new_value: None,
        }),
    }
}

fn parse(path: &'static str) -> Option<FilterPath> {
    match FilterPath::new(path) {
        Ok(p) => Some(p),
        Err(err) => {
            tracing::warn!(path, %err, "rule references an invalid path");
            None
        }
    }
}

fn active_list<'a>(state: &'a FilterState, path: &FilterPath) -> Option<&'a [String]> {
    state
        .filters
        .get(path)
        .and_then(|v| v.as_list())
        .filter(|items| !items.is_empty())
}

/// Which of two paths gives way: the more recently touched one; on a tie the
/// one written by the lower-precedence source; otherwise `tie`.
fn give_way<'a>(state: &FilterState, a: &'a FilterPath, b: &'a FilterPath, tie: &'a FilterPath) -> &'a FilterPath {
    let ta = state.metadata.last_touch(a);
    let tb = state.metadata.last_touch(b);
    let va = ta.map(|t| t.version).unwrap_or(0);
    let vb = tb.map(|t| t.version).unwrap_or(0);
    if va != vb {
        return if va > vb { a } else { b };
    }
    match (ta, tb) {
        (Some(x), Some(y)) if x.source.precedence() != y.source.precedence() => {
            if x.source.precedence() < y.source.precedence() {
                a
            } else {
                b
            }
        }
        _ => tie,
    }
}

fn check_exclusion(state: &FilterState, rule: &ExclusionRule) -> Option<FilterConflict> {
    let restricted = parse(rule.restricted)?;
    let other = parse(rule.other)?;
    let selected = active_list(state, &restricted)?;
    if !selected.iter().all(|s| rule.within.contains(&s.as_str())) {
        return None;
    }
    let other_selected = active_list(state, &other)?;
    if other_selected
        .iter()
        .any(|s| rule.compatible.contains(&s.as_str()))
    {
        return None;
    }
    let remove = give_way(state, &restricted, &other, &other);
    Some(build(
        ConflictType::Exclusion,
        vec![restricted.to_string(), other.to_string()],
        format!(
            "{} [{}] excludes {} [{}]: {}",
            restricted,
            selected.join(", "),
            other,
            other_selected.join(", "),
            rule.reason
        ),
        ConflictSeverity::High,
        false,
        Some(remove),
    ))
}

fn check_contradiction(state: &FilterState, rule: &ContradictionRule) -> Option<FilterConflict> {
    let category = parse(rule.category)?;
    let range_path = parse(rule.range)?;
    let selected = active_list(state, &category)?;
    let range = state
        .filters
        .get(&range_path)
        .and_then(|v| v.as_range())
        .filter(|r| !r.is_unbounded())?;
    for item in selected {
        match rule.bands.iter().find(|b| b.category == item.as_str()) {
            None => return None,
            Some(band) if range.overlaps(band.lo, band.hi) => return None,
            Some(_) => {}
        }
    }
    let remove = give_way(state, &category, &range_path, &range_path);
    Some(build(
        ConflictType::Contradiction,
        vec![category.to_string(), range_path.to_string()],
        format!(
            "{} [{}] does not overlap the selected {} band",
            category,
            selected.join(", "),
            rule.label
        ),
        ConflictSeverity::Medium,
        true,
        Some(remove),
    ))
}

fn check_performance(
    schema: &Schema,
    state: &FilterState,
    context: &CombinationContext,
) -> Option<FilterConflict> {
    state
        .filters
        .dimension(SEARCH_DIMENSION)
        .filter(|v| !v.is_empty())?;
    let heavy: Vec<String> = schema
        .leaf_paths()
        .into_iter()
        .filter(|(path, spec)| {
            spec.high_cardinality
                || schema
                    .dimension(path.root())
                    .map(|d| d.high_cardinality)
                    .unwrap_or(false)
        })
        .filter(|(path, _)| state.filters.get(path).map(|v| !v.is_empty()).unwrap_or(false))
        .map(|(path, _)| path.to_string())
        .collect();
    if heavy.len() <= context.performance_threshold {
        return None;
    }
    let count = heavy.len();
    let mut filters = heavy;
    filters.push(SEARCH_DIMENSION.to_string());
    Some(build(
        ConflictType::Performance,
        filters,
        format!("{count} broad filters combined with free-text search may be slow"),
        ConflictSeverity::Low,
        false,
        None,
    ))
}

fn check_availability(
    schema: &Schema,
    state: &FilterState,
    context: &CombinationContext,
) -> Option<FilterConflict> {
    let count = context.estimated_result_count?;
    if count >= context.near_empty_threshold {
        return None;
    }
    let active = state.filters.active_paths(schema);
    let remove = active
        .iter()
        .enumerate()
        .max_by_key(|(idx, path)| {
            let touch = state.metadata.last_touch(path);
            (
                touch.map(|t| t.version).unwrap_or(0),
                Reverse(touch.map(|t| t.source.precedence()).unwrap_or(0)),
                *idx,
            )
        })
        .map(|(_, path)| path.clone())?;
    let (severity, message) = if count == 0 {
        (ConflictSeverity::High, "the current filters match no companies".to_string())
    } else {
        (
            ConflictSeverity::Medium,
            format!("the current filters match only {count} companies"),
        )
    };
    Some(build(
        ConflictType::DataAvailability,
        active.iter().map(FilterPath::to_string).collect(),
        message,
        severity,
        false,
        Some(&remove),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use pfe_core::{FilterSource, FixedClock, Timestamp};
    use pfe_schema::FilterValue;
    use pfe_state::{FilterAction, Reducer};

    fn path(s: &str) -> FilterPath {
        FilterPath::new(s).unwrap()
    }

    fn reducer() -> Reducer {
        let clock = FixedClock::new(Timestamp::parse("2025-01-15T09:30:00Z").unwrap());
        Reducer::new(Arc::new(Schema::portfolio()), Arc::new(clock))
    }

    fn apply(r: &Reducer, actions: &[FilterAction]) -> FilterState {
        r.reduce_all(&r.initial_state(), actions)
    }

    fn upd(p: &str, v: FilterValue, s: FilterSource) -> FilterAction {
        FilterAction::update(path(p), v, s)
    }

    #[test]
    fn test_grade_revenue_contradiction() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("riskGrades", FilterValue::list(["CM1"]), FilterSource::Manual),
                upd("financialMetrics.revenue", FilterValue::range(None, Some(50.0)), FilterSource::Manual),
            ],
        );
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.conflict_type, ConflictType::Contradiction);
        assert!(c.auto_resolvable);
        assert_eq!(c.severity, ConflictSeverity::Medium);
        assert_eq!(c.filters, vec!["financialMetrics.revenue", "riskGrades"]);
        assert_eq!(
            c.suggested_resolution.as_ref().unwrap().filter_type,
            "financialMetrics.revenue"
        );
        assert!(c.id.starts_with("contradiction-"));
        assert_eq!(c.id.len(), "contradiction-".len() + 16);
    }

    #[test]
    fn test_more_recent_grade_gives_way() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("financialMetrics.revenue", FilterValue::range(None, Some(50.0)), FilterSource::Chart),
                upd("riskGrades", FilterValue::list(["CM1"]), FilterSource::Chart),
            ],
        );
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(conflicts[0].suggested_resolution.as_ref().unwrap().filter_type, "riskGrades");
    }

    #[test]
    fn test_overlapping_grade_clears_contradiction() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("riskGrades", FilterValue::list(["CM1", "CM7"]), FilterSource::Manual),
                upd("financialMetrics.revenue", FilterValue::range(None, Some(50.0)), FilterSource::Manual),
            ],
        );
        assert!(validate_combination(r.schema(), &state, &CombinationContext::default()).is_empty());
    }

    #[test]
    fn test_untouched_tie_clears_numeric() {
        let r = reducer();
        let mut state = apply(
            &r,
            &[
                upd("riskGrades", FilterValue::list(["CM7"]), FilterSource::Url),
                upd(
                    "financialMetrics.debtEquityRatio",
                    FilterValue::range(None, Some(1.0)),
                    FilterSource::Url,
                ),
            ],
        );
        state.metadata.touched.clear();
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(
            conflicts[0].suggested_resolution.as_ref().unwrap().filter_type,
            "financialMetrics.debtEquityRatio"
        );
    }

    #[test]
    fn test_exclusion_unlisted_rated() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("listingStatus", FilterValue::list(["unlisted"]), FilterSource::Manual),
                upd("creditRatings", FilterValue::list(["AAA"]), FilterSource::Chart),
            ],
        );
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Exclusion);
        assert!(!conflicts[0].auto_resolvable);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);

        let with_nr = apply(
            &r,
            &[
                upd("listingStatus", FilterValue::list(["unlisted"]), FilterSource::Manual),
                upd("creditRatings", FilterValue::list(["AAA", "NR"]), FilterSource::Chart),
            ],
        );
        assert!(validate_combination(r.schema(), &with_nr, &CombinationContext::default()).is_empty());
    }

    #[test]
    fn test_exclusion_pending_graded() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("processingStatus", FilterValue::list(["pending"]), FilterSource::Manual),
                upd("riskGrades", FilterValue::list(["CM3"]), FilterSource::Manual),
            ],
        );
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].filters, vec!["processingStatus", "riskGrades"]);
    }

    #[test]
    fn test_performance_needs_search_and_threshold() {
        let r = reducer();
        let mut actions = vec![
            upd("industries", FilterValue::list(["energy"]), FilterSource::Manual),
            upd("regions", FilterValue::list(["north"]), FilterSource::Manual),
            upd("financialMetrics.currentRatio", FilterValue::range(Some(1.0), None), FilterSource::Manual),
            upd("financialMetrics.ebitdaMargin", FilterValue::range(Some(5.0), None), FilterSource::Manual),
        ];
        let no_search = apply(&r, &actions);
        assert!(validate_combination(r.schema(), &no_search, &CombinationContext::default()).is_empty());

        actions.push(upd("searchQuery", FilterValue::text("power"), FilterSource::Search));
        let state = apply(&r, &actions);
        let conflicts = validate_combination(r.schema(), &state, &CombinationContext::default());
        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.conflict_type, ConflictType::Performance);
        assert_eq!(c.severity, ConflictSeverity::Low);
        assert!(c.suggested_resolution.is_none());
        assert!(c.filters.contains(&"searchQuery".to_string()));
    }

    #[test]
    fn test_data_availability_levels() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("regions", FilterValue::list(["east"]), FilterSource::Manual),
                upd("industries", FilterValue::list(["retail"]), FilterSource::Chart),
            ],
        );
        let zero = validate_combination(r.schema(), &state, &CombinationContext::with_estimate(0));
        assert_eq!(zero[0].severity, ConflictSeverity::High);
        assert_eq!(zero[0].suggested_resolution.as_ref().unwrap().filter_type, "industries");
        let few = validate_combination(r.schema(), &state, &CombinationContext::with_estimate(4));
        assert_eq!(few[0].severity, ConflictSeverity::Medium);
        assert_eq!(zero[0].id, few[0].id);
        assert!(validate_combination(r.schema(), &state, &CombinationContext::with_estimate(10)).is_empty());
        let empty = r.initial_state();
        assert!(validate_combination(r.schema(), &empty, &CombinationContext::with_estimate(0)).is_empty());
    }

    #[test]
    fn test_ids_are_deterministic() {
        let r = reducer();
        let state = apply(
            &r,
            &[
                upd("riskGrades", FilterValue::list(["CM1"]), FilterSource::Manual),
                upd("financialMetrics.revenue", FilterValue::range(None, Some(50.0)), FilterSource::Manual),
                upd("listingStatus", FilterValue::list(["unlisted"]), FilterSource::Manual),
                upd("creditRatings", FilterValue::list(["A"]), FilterSource::Manual),
            ],
        );
        let ctx = CombinationContext::with_estimate(0);
        let a: Vec<String> = validate_combination(r.schema(), &state, &ctx).into_iter().map(|c| c.id).collect();
        let b: Vec<String> = validate_combination(r.schema(), &state, &ctx).into_iter().map(|c| c.id).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(
            conflict_id(ConflictType::Exclusion, &["b".into(), "a".into()]),
            conflict_id(ConflictType::Exclusion, &["a".into(), "b".into()])
        );
        assert_ne!(
            conflict_id(ConflictType::Exclusion, &["a".into()]),
            conflict_id(ConflictType::Contradiction, &["a".into()])
        );
    }
}
