//! # pfe-bridge: Chart-Interaction Bridge
//!
//! Turns a click on a chart segment into the [`FilterAction`] that applies
//! it. The bridge reads the current state to compute toggles but never
//! dispatches; the caller feeds the action to the reducer.
//!
//! ## Click semantics
//!
//! | Dimension | Click | Action |
//! |-----------|-------|--------|
//! | single-select list | select a new bucket | `UPDATE_FILTER [bucket]` |
//! | single-select list | select the selected bucket | `CLEAR_FILTER` |
//! | multi-select list | select an absent bucket | `UPDATE_FILTER list + bucket` |
//! | multi-select list | select a present bucket, or deselect | `UPDATE_FILTER list - bucket` |
//! | range (always single-select) | select a band | `UPDATE_FILTER band`, or `CLEAR_FILTER` if already applied |
//!
//! Every action is stamped `source: chart`.

use pfe_core::{FilterPath, FilterSource};
use pfe_schema::{DimensionKind, DimensionSpec, FilterValue, RangeBounds, Schema, Selection, ValueKind};
use pfe_state::{FilterAction, FilterState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Trigger ─────────────────────────────────────────────────────────

/// The bucket a chart segment stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartValue {
    /// A categorical bucket, e.g. a risk grade bar.
    Category(String),
    /// A numeric band, e.g. a revenue histogram bin.
    Band {
        /// Lower edge, `None` for an open-ended first bin.
        min: Option<f64>,
        /// Upper edge, `None` for an open-ended last bin.
        max: Option<f64>,
    },
}

/// Whether the segment was selected or deselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickAction {
    /// Segment clicked on.
    #[default]
    Select,
    /// Segment clicked off, e.g. from a legend.
    Deselect,
}

/// A selection event emitted by a chart surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartFilterTrigger {
    /// Chart kind, for logs only.
    pub chart_type: String,
    /// Segment id within the chart, for logs only.
    pub segment_id: String,
    /// The dimension the chart is bound to.
    pub filter_type: FilterPath,
    /// The clicked bucket.
    pub filter_value: ChartValue,
    /// Select or deselect.
    #[serde(default)]
    pub action: ClickAction,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Why a click could not be translated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The chart is bound to a path the table does not declare.
    #[error("chart bound to unknown dimension '{path}'")]
    UnknownDimension {
        /// The bound path.
        path: String,
    },

    /// Only list and range dimensions are chart-selectable.
    #[error("dimension '{path}' of kind {kind} cannot be selected from a chart")]
    NotChartable {
        /// The bound path.
        path: String,
        /// Its declared kind.
        kind: ValueKind,
    },

    /// The clicked bucket does not fit the dimension.
    #[error("chart value does not fit '{path}': {reason}")]
    ValueMismatch {
        /// The bound path.
        path: String,
        /// Why.
        reason: String,
    },
}

// ─── Translation ─────────────────────────────────────────────────────

/// Translate `trigger` against the current `state`.
///
/// A deselect of a bucket that is not selected yields an `UPDATE_FILTER`
/// carrying the unchanged value.
pub fn translate_click(
    schema: &Schema,
    state: &FilterState,
    trigger: &ChartFilterTrigger,
) -> Result<FilterAction, BridgeError> {
    let path = &trigger.filter_type;
    let spec = schema.resolve(path).ok_or_else(|| BridgeError::UnknownDimension {
        path: path.to_string(),
    })?;
    let action = match (&spec.kind, &trigger.filter_value) {
        (DimensionKind::List { selection, .. }, ChartValue::Category(raw)) => {
            let item = canonical_item(spec, path, raw)?;
            let current: Vec<String> = state
                .filters
                .get(path)
                .and_then(FilterValue::as_list)
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            match selection {
                Selection::Single => single_select(path, &current, item, trigger.action),
                Selection::Multi => multi_select(path, current, item, trigger.action),
            }
        }
        (DimensionKind::Range { domain }, ChartValue::Band { min, max }) => {
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(mismatch(path, format!("band {lo}..{hi} is inverted")));
                }
            }
            if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
                return Err(mismatch(path, "band edges must be finite"));
            }
            let band = RangeBounds::new(min.map(|v| domain.clamp(v)), max.map(|v| domain.clamp(v)));
            let current = state.filters.get(path).and_then(FilterValue::as_range).copied();
            let applied = current == Some(band);
            match (trigger.action, applied) {
                (_, true) => FilterAction::clear_from(path.clone(), FilterSource::Chart),
                (ClickAction::Select, false) => {
                    FilterAction::update(path.clone(), FilterValue::Range(band), FilterSource::Chart)
                }
                (ClickAction::Deselect, false) => FilterAction::update(
                    path.clone(),
                    FilterValue::Range(current.unwrap_or_default()),
                    FilterSource::Chart,
                ),
            }
        }
        (DimensionKind::List { .. }, ChartValue::Band { .. }) => {
            return Err(mismatch(path, "a numeric band was clicked on a list dimension"));
        }
        (DimensionKind::Range { .. }, ChartValue::Category(_)) => {
            return Err(mismatch(path, "a category was clicked on a range dimension"));
        }
        (kind, _) => {
            return Err(BridgeError::NotChartable {
                path: path.to_string(),
                kind: kind.value_kind(),
            });
        }
    };
    tracing::debug!(
        chart = %trigger.chart_type,
        segment = %trigger.segment_id,
        %path,
        action = action.type_name(),
        "chart click translated"
    );
    Ok(action)
}

fn single_select(path: &FilterPath, current: &[String], item: String, click: ClickAction) -> FilterAction {
    let selected = current.len() == 1 && current[0] == item;
    match (click, selected) {
        (_, true) => FilterAction::clear_from(path.clone(), FilterSource::Chart),
        (ClickAction::Select, false) => {
            FilterAction::update(path.clone(), FilterValue::List(vec![item]), FilterSource::Chart)
        }
        (ClickAction::Deselect, false) => {
            FilterAction::update(path.clone(), FilterValue::List(current.to_vec()), FilterSource::Chart)
        }
    }
}

fn multi_select(path: &FilterPath, mut current: Vec<String>, item: String, click: ClickAction) -> FilterAction {
    let present = current.contains(&item);
    match (click, present) {
        (ClickAction::Select, false) => current.push(item),
        (_, true) => current.retain(|i| *i != item),
        (ClickAction::Deselect, false) => {}
    }
    FilterAction::update(path.clone(), FilterValue::List(current), FilterSource::Chart)
}

fn canonical_item(spec: &DimensionSpec, path: &FilterPath, raw: &str) -> Result<String, BridgeError> {
    let item = raw.trim();
    if item.is_empty() {
        return Err(mismatch(path, "empty category"));
    }
    match spec.vocabulary() {
        None => Ok(item.to_string()),
        Some(vocab) => vocab
            .iter()
            .find(|v| v.eq_ignore_ascii_case(item))
            .cloned()
            .ok_or_else(|| mismatch(path, format!("{item:?} is not a declared option"))),
    }
}

fn mismatch(path: &FilterPath, reason: impl Into<String>) -> BridgeError {
    BridgeError::ValueMismatch {
        path: path.to_string(),
        reason: reason.into(),
    }
}
