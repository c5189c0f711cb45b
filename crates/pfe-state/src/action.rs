//! # Action Protocol
//!
//! Every change to a [`FilterState`] is expressed as a `FilterAction`.
//! Wire form is an internally tagged object:
//!
//! ```text
//! {"type": "UPDATE_FILTER", "filterType": "riskGrades", "value": ["CM1"], "source": "chart"}
//! {"type": "CLEAR_FILTER", "filterType": "financialMetrics.revenue"}
//! {"type": "MERGE_FILTERS", "filters": {"industries": ["manufacturing"]}, "source": "preset"}
//! ```
//!
//! | Action | Mutating |
//! |--------|----------|
//! | `UPDATE_FILTER`, `CLEAR_FILTER`, `CLEAR_ALL_FILTERS`, `MERGE_FILTERS` | yes, bumps version |
//! | `LOAD_STATE` | replaces state, keeps incoming version |
//! | `SET_LOADING`, `ADD_ERROR`, `CLEAR_ERRORS`, `ADD_CONFLICT`, `RESOLVE_CONFLICT` | UI only |

use std::collections::BTreeMap;

use pfe_core::{FilterPath, FilterSource};
use pfe_schema::{FilterValue, Schema};
use serde::Serialize;
use serde_json::Value;

use crate::error::StateError;
use crate::state::{FilterConflict, FilterError, FilterState};

/// A state transition request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum FilterAction {
    /// Replace the value at a path wholesale.
    UpdateFilter {
        /// Dotted path.
        filter_type: FilterPath,
        /// New value.
        value: FilterValue,
        /// Origin; `manual` when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<FilterSource>,
    },
    /// Reset the value at a path to its empty value.
    ClearFilter {
        /// Dotted path.
        filter_type: FilterPath,
        /// Origin; the state's current source when absent.
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<FilterSource>,
    },
    /// Reset every dimension and the UI state.
    ClearAllFilters,
    /// Replace the whole state.
    LoadState {
        /// Incoming state; its version and source are kept.
        state: Box<FilterState>,
    },
    /// Set the loading flag.
    SetLoading {
        /// New flag.
        is_loading: bool,
    },
    /// Append a field error.
    AddError {
        /// The error.
        error: FilterError,
    },
    /// Drop all field errors.
    ClearErrors,
    /// Append a conflict.
    AddConflict {
        /// The conflict.
        conflict: FilterConflict,
    },
    /// Drop the conflict with this id, if present.
    ResolveConflict {
        /// Conflict id.
        conflict_id: String,
    },
    /// Replace the supplied dimensions, leaving the rest untouched.
    MergeFilters {
        /// Dimension path to new value.
        filters: BTreeMap<String, FilterValue>,
        /// Origin.
        source: FilterSource,
    },
    /// An action type this engine does not know. Reduces to a no-op.
    #[serde(skip)]
    Unrecognized {
        /// The `type` field as received.
        action_type: String,
    },
}

impl FilterAction {
    /// `UPDATE_FILTER` with an explicit source.
    pub fn update(filter_type: FilterPath, value: FilterValue, source: FilterSource) -> Self {
        Self::UpdateFilter {
            filter_type,
            value,
            source: Some(source),
        }
    }

    /// `CLEAR_FILTER`.
    pub fn clear(filter_type: FilterPath) -> Self {
        Self::ClearFilter {
            filter_type,
            source: None,
        }
    }

    /// `CLEAR_FILTER` with an explicit source.
    pub fn clear_from(filter_type: FilterPath, source: FilterSource) -> Self {
        Self::ClearFilter {
            filter_type,
            source: Some(source),
        }
    }

    /// Wire name of the action type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::UpdateFilter { .. } => "UPDATE_FILTER",
            Self::ClearFilter { .. } => "CLEAR_FILTER",
            Self::ClearAllFilters => "CLEAR_ALL_FILTERS",
            Self::LoadState { .. } => "LOAD_STATE",
            Self::SetLoading { .. } => "SET_LOADING",
            Self::AddError { .. } => "ADD_ERROR",
            Self::ClearErrors => "CLEAR_ERRORS",
            Self::AddConflict { .. } => "ADD_CONFLICT",
            Self::ResolveConflict { .. } => "RESOLVE_CONFLICT",
            Self::MergeFilters { .. } => "MERGE_FILTERS",
            Self::Unrecognized { action_type } => action_type,
        }
    }

    /// Whether reducing this action bumps the version.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::UpdateFilter { .. }
                | Self::ClearFilter { .. }
                | Self::ClearAllFilters
                | Self::MergeFilters { .. }
        )
    }

    /// Decode an external action. Values are decoded against the kind the
    /// table declares for their path; an unknown `type` becomes
    /// [`FilterAction::Unrecognized`].
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Self, StateError> {
        let obj = json
            .as_object()
            .ok_or_else(|| StateError::malformed("action", "not an object"))?;
        let action_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| StateError::malformed("action", "missing string field 'type'"))?;

        let field = |name: &'static str| {
            obj.get(name)
                .ok_or_else(|| StateError::malformed("action", format!("{action_type} requires '{name}'")))
        };
        let path = |name: &'static str| -> Result<FilterPath, StateError> {
            let raw = field(name)?
                .as_str()
                .ok_or_else(|| StateError::malformed("action", format!("'{name}' must be a string")))?;
            Ok(FilterPath::new(raw)?)
        };
        let source = |required: bool| -> Result<Option<FilterSource>, StateError> {
            match obj.get("source") {
                None | Some(Value::Null) if !required => Ok(None),
                None | Some(Value::Null) => {
                    Err(StateError::malformed("action", format!("{action_type} requires 'source'")))
                }
                Some(v) => serde_json::from_value(v.clone())
                    .map(Some)
                    .map_err(|e| StateError::malformed("action", e.to_string())),
            }
        };

        let action = match action_type {
            "UPDATE_FILTER" => {
                let filter_type = path("filterType")?;
                let value = schema.decode_value(&filter_type, field("value")?)?;
                Self::UpdateFilter {
                    filter_type,
                    value,
                    source: source(false)?,
                }
            }
            "CLEAR_FILTER" => Self::ClearFilter {
                filter_type: path("filterType")?,
                source: source(false)?,
            },
            "CLEAR_ALL_FILTERS" => Self::ClearAllFilters,
            "LOAD_STATE" => Self::LoadState {
                state: Box::new(FilterState::from_json(schema, field("state")?)?),
            },
            "SET_LOADING" => Self::SetLoading {
                is_loading: field("isLoading")?
                    .as_bool()
                    .ok_or_else(|| StateError::malformed("action", "'isLoading' must be a boolean"))?,
            },
            "ADD_ERROR" => Self::AddError {
                error: serde_json::from_value(field("error")?.clone())
                    .map_err(|e| StateError::malformed("action", e.to_string()))?,
            },
            "CLEAR_ERRORS" => Self::ClearErrors,
            "ADD_CONFLICT" => Self::AddConflict {
                conflict: FilterConflict::from_json(schema, field("conflict")?)?,
            },
            "RESOLVE_CONFLICT" => Self::ResolveConflict {
                conflict_id: field("conflictId")?
                    .as_str()
                    .ok_or_else(|| StateError::malformed("action", "'conflictId' must be a string"))?
                    .to_string(),
            },
            "MERGE_FILTERS" => {
                let raw = field("filters")?
                    .as_object()
                    .ok_or_else(|| StateError::malformed("action", "'filters' must be an object"))?;
                let mut filters = BTreeMap::new();
                for (key, v) in raw {
                    let p = FilterPath::new(key.clone())?;
                    filters.insert(key.clone(), schema.decode_value(&p, v)?);
                }
                Self::MergeFilters {
                    filters,
                    source: source(true)?.unwrap_or_default(),
                }
            }
            other => Self::Unrecognized {
                action_type: other.to_string(),
            },
        };
        Ok(action)
    }
}
