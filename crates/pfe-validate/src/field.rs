//! # Per-field Validation and Sanitization
//!
//! `validate_field` reports; `sanitize_field` coerces. Editors sanitize
//! first and validate the result, so only problems that cannot be fixed
//! safely (an unknown option, an inverted range) reject an edit.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use pfe_core::FilterPath;
use pfe_schema::{DimensionKind, DimensionSpec, FilterValue, RangeBounds, Schema};
use pfe_state::FilterError;

use crate::issue::FieldIssue;

/// Outcome of [`validate_field`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldValidation {
    /// False iff any error has severity `error`.
    pub is_valid: bool,
    /// Findings, errors and warnings, in detection order.
    pub errors: Vec<FilterError>,
}

impl FieldValidation {
    fn from_issues(issues: Vec<(String, FieldIssue)>) -> Self {
        let errors: Vec<FilterError> = issues
            .into_iter()
            .map(|(path, issue)| issue.into_error(&path))
            .collect();
        Self {
            is_valid: !errors.iter().any(FilterError::is_error),
            errors,
        }
    }
}

/// Validate `value` as the value of the dimension at `path`, judging
/// future dates against today's UTC date.
pub fn validate_field(schema: &Schema, path: &FilterPath, value: &FilterValue) -> FieldValidation {
    validate_field_on(schema, path, value, Utc::now().date_naive())
}

/// [`validate_field`] with an explicit "today".
pub fn validate_field_on(
    schema: &Schema,
    path: &FilterPath,
    value: &FilterValue,
    today: NaiveDate,
) -> FieldValidation {
    let mut issues = Vec::new();
    match schema.resolve(path) {
        None => issues.push((path.to_string(), FieldIssue::UnknownFilter)),
        Some(spec) => check(path.as_str(), spec, value, today, &mut issues),
    }
    FieldValidation::from_issues(issues)
}

fn check(
    path: &str,
    spec: &DimensionSpec,
    value: &FilterValue,
    today: NaiveDate,
    out: &mut Vec<(String, FieldIssue)>,
) {
    if !spec.conforms(value) {
        out.push((
            path.to_string(),
            FieldIssue::KindMismatch {
                expected: spec.kind.value_kind(),
                found: value.kind(),
            },
        ));
        return;
    }
    match (&spec.kind, value) {
        (DimensionKind::List { vocabulary, .. }, FilterValue::List(items)) => {
            if let Some(vocab) = vocabulary {
                let invalid: Vec<String> = items
                    .iter()
                    .filter(|item| !vocab.contains(item))
                    .cloned()
                    .collect();
                if !invalid.is_empty() {
                    out.push((path.to_string(), FieldIssue::InvalidOption { options: invalid }));
                }
            }
            let mut seen = HashSet::new();
            let mut reported = HashSet::new();
            for item in items {
                if !seen.insert(item.as_str()) && reported.insert(item.as_str()) {
                    out.push((path.to_string(), FieldIssue::DuplicateValue { item: item.clone() }));
                }
            }
        }
        (DimensionKind::Range { domain }, FilterValue::Range(r)) => {
            let mut finite = true;
            for (name, bound) in [("minimum", r.min), ("maximum", r.max)] {
                let Some(v) = bound else { continue };
                if !v.is_finite() {
                    finite = false;
                    out.push((path.to_string(), FieldIssue::NotFinite { bound: name }));
                } else if !domain.contains(v) {
                    out.push((
                        path.to_string(),
                        FieldIssue::OutOfBounds {
                            bound: name,
                            value: v,
                            min: domain.min,
                            max: domain.max,
                        },
                    ));
                }
            }
            if let (true, Some(min), Some(max)) = (finite, r.min, r.max) {
                if min > max {
                    out.push((path.to_string(), FieldIssue::InvalidRange { min, max }));
                }
            }
        }
        (DimensionKind::DateRange, FilterValue::DateRange(d)) => {
            if let (Some(start), Some(end)) = (d.start_date, d.end_date) {
                if start > end {
                    out.push((path.to_string(), FieldIssue::InvalidDateRange { start, end }));
                }
            }
            if let Some(start) = d.start_date {
                if start > today {
                    out.push((path.to_string(), FieldIssue::FutureDate { start }));
                }
            }
        }
        (DimensionKind::Text { max_len }, FilterValue::Text(s)) => {
            let len = s.chars().count();
            if len > *max_len {
                out.push((path.to_string(), FieldIssue::TooLong { len, max: *max_len }));
            }
        }
        (DimensionKind::Group { members }, FilterValue::Group(values)) => {
            for member in members {
                if let Some(v) = values.get(&member.name) {
                    check(&format!("{path}.{}", member.name), member, v, today, out);
                }
            }
        }
        _ => {}
    }
}

/// Coerce `value` towards validity where that is safe.
///
/// - lists: trim items, drop blanks, map to the vocabulary's spelling
///   case-insensitively, de-duplicate keeping first occurrences;
/// - ranges: drop non-finite bounds, clamp to the domain;
/// - text: trim, collapse internal whitespace, truncate to the limit;
/// - groups: member-wise.
///
/// Unknown paths and values of the wrong kind are returned unchanged for
/// [`validate_field`] to report.
pub fn sanitize_field(schema: &Schema, path: &FilterPath, value: &FilterValue) -> FilterValue {
    match schema.resolve(path) {
        Some(spec) if spec.conforms(value) => sanitize(spec, value),
        _ => value.clone(),
    }
}

fn sanitize(spec: &DimensionSpec, value: &FilterValue) -> FilterValue {
    match (&spec.kind, value) {
        (DimensionKind::List { vocabulary, .. }, FilterValue::List(items)) => {
            let mut seen = HashSet::new();
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let trimmed = item.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let canonical = vocabulary
                    .as_ref()
                    .and_then(|v| v.iter().find(|opt| opt.eq_ignore_ascii_case(trimmed)))
                    .map(String::as_str)
                    .unwrap_or(trimmed);
                if seen.insert(canonical.to_string()) {
                    out.push(canonical.to_string());
                }
            }
            FilterValue::List(out)
        }
        (DimensionKind::Range { domain }, FilterValue::Range(r)) => {
            let fix = |b: Option<f64>| b.filter(|v| v.is_finite()).map(|v| domain.clamp(v));
            FilterValue::Range(RangeBounds::new(fix(r.min), fix(r.max)))
        }
        (DimensionKind::Text { max_len }, FilterValue::Text(s)) => {
            let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
            FilterValue::Text(collapsed.chars().take(*max_len).collect())
        }
        (DimensionKind::Group { members }, FilterValue::Group(values)) => FilterValue::Group(
            values
                .iter()
                .map(|(name, v)| {
                    let fixed = members
                        .iter()
                        .find(|m| &m.name == name)
                        .map(|m| sanitize(m, v))
                        .unwrap_or_else(|| v.clone());
                    (name.clone(), fixed)
                })
                .collect(),
        ),
        _ => value.clone(),
    }
}
