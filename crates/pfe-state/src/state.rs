//! # Filter State
//!
//! `FilterState = {filters, metadata, ui}`, serialized camelCase.
//!
//! - `metadata.version` counts mutating transitions and starts at 1.
//! - `metadata.touched` records, per addressed path, the source and version
//!   of its last mutation. Conflict suggestions use it to decide which of two
//!   dimensions was written more recently.
//! - `ui` is transient: loading flag, field errors, cross-field conflicts.

use std::collections::BTreeMap;

use pfe_core::{FilterPath, FilterSource, Timestamp};
use pfe_schema::{FilterValue, Schema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateError;
use crate::filters::FilterSet;

// ─── Metadata ────────────────────────────────────────────────────────

/// Last write to one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Touch {
    /// Origin of the write.
    pub source: FilterSource,
    /// State version produced by the write.
    pub version: u64,
}

/// Provenance and versioning of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Time of the last mutating transition.
    pub last_updated: Timestamp,
    /// Origin of the last mutating transition.
    pub source: FilterSource,
    /// Time the state was created or last loaded wholesale.
    pub applied_at: Timestamp,
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Last write per addressed path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub touched: BTreeMap<FilterPath, Touch>,
}

impl Metadata {
    /// Fresh metadata at version 1.
    pub fn initial(now: Timestamp) -> Self {
        Self {
            last_updated: now,
            source: FilterSource::Manual,
            applied_at: now,
            version: 1,
            touched: BTreeMap::new(),
        }
    }

    /// The most recent write affecting `path`: to the path itself or to any
    /// ancestor group.
    pub fn last_touch(&self, path: &FilterPath) -> Option<Touch> {
        path.lineage()
            .iter()
            .filter_map(|p| self.touched.get(p).copied())
            .max_by_key(|t| t.version)
    }
}

// ─── UI-only state ───────────────────────────────────────────────────

/// Severity of a field-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational; the value is accepted.
    Warning,
    /// The value is rejected.
    Error,
}

/// A field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterError {
    /// Dotted path of the offending dimension.
    pub filter_type: String,
    /// Human-readable message.
    pub message: String,
    /// Stable machine code, e.g. `INVALID_RANGE`.
    pub code: String,
    /// Severity.
    pub severity: ErrorSeverity,
}

impl FilterError {
    /// An error-severity entry.
    pub fn error(filter_type: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            filter_type: filter_type.into(),
            message: message.into(),
            code: code.to_string(),
            severity: ErrorSeverity::Error,
        }
    }

    /// A warning-severity entry.
    pub fn warning(filter_type: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Warning,
            ..Self::error(filter_type, code, message)
        }
    }

    /// Whether this entry rejects the value.
    pub fn is_error(&self) -> bool {
        self.severity == ErrorSeverity::Error
    }
}

/// Category of a cross-field conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Value sets that cannot co-occur.
    Exclusion,
    /// Categorical and numeric bands that do not overlap.
    Contradiction,
    /// Expensive combination, informational.
    Performance,
    /// Empty or near-empty estimated result.
    DataAvailability,
}

impl ConflictType {
    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exclusion => "exclusion",
            Self::Contradiction => "contradiction",
            Self::Performance => "performance",
            Self::DataAvailability => "data_availability",
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a cross-field conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    /// Informational.
    Low,
    /// Should be addressed.
    Medium,
    /// Result set is meaningless until resolved.
    High,
}

/// What a suggested resolution does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionAction {
    /// Clear the dimension.
    Remove,
    /// Narrow or widen the dimension to `new_value`.
    Modify,
    /// Replace the dimension with `new_value`.
    Replace,
}

/// A proposed fix for a conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedResolution {
    /// What to do.
    pub action: ResolutionAction,
    /// Dotted path to act on.
    pub filter_type: String,
    /// Replacement value for `modify`/`replace`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<FilterValue>,
}

/// A cross-field rule violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConflict {
    /// Deterministic identity derived from type and involved filters.
    pub id: String,
    /// Category.
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// Dotted paths involved.
    pub filters: Vec<String>,
    /// Human-readable message.
    pub message: String,
    /// Severity.
    pub severity: ConflictSeverity,
    /// Whether the resolver may apply the suggestion without asking.
    pub auto_resolvable: bool,
    /// Proposed fix, when the rule has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_resolution: Option<SuggestedResolution>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResolution {
    action: ResolutionAction,
    filter_type: String,
    #[serde(default)]
    new_value: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConflict {
    id: String,
    #[serde(rename = "type")]
    conflict_type: ConflictType,
    filters: Vec<String>,
    message: String,
    severity: ConflictSeverity,
    auto_resolvable: bool,
    #[serde(default)]
    suggested_resolution: Option<RawResolution>,
}

impl FilterConflict {
    /// Decode a conflict from JSON; a suggested `newValue` is decoded against
    /// the kind of its `filterType`.
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Self, StateError> {
        let raw: RawConflict = serde_json::from_value(json.clone())
            .map_err(|e| StateError::malformed("conflict", e.to_string()))?;
        let suggested_resolution = match raw.suggested_resolution {
            None => None,
            Some(r) => {
                let new_value = match r.new_value {
                    None | Some(Value::Null) => None,
                    Some(v) => {
                        let path = FilterPath::new(r.filter_type.clone())?;
                        Some(schema.decode_value(&path, &v)?)
                    }
                };
                Some(SuggestedResolution {
                    action: r.action,
                    filter_type: r.filter_type,
                    new_value,
                })
            }
        };
        Ok(Self {
            id: raw.id,
            conflict_type: raw.conflict_type,
            filters: raw.filters,
            message: raw.message,
            severity: raw.severity,
            auto_resolvable: raw.auto_resolvable,
            suggested_resolution,
        })
    }
}

/// Transient UI state. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    /// A fetch driven by this state is in flight.
    pub is_loading: bool,
    /// Field errors, in arrival order.
    pub errors: Vec<FilterError>,
    /// Cross-field conflicts, in arrival order.
    pub conflicts: Vec<FilterConflict>,
}

// ─── Filter State ────────────────────────────────────────────────────

/// The whole state of one filtering session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Current filter values.
    pub filters: FilterSet,
    /// Provenance and version.
    pub metadata: Metadata,
    /// Transient UI state.
    pub ui: UiState,
}

impl FilterState {
    /// Every dimension empty, version 1.
    pub fn initial(schema: &Schema, now: Timestamp) -> Self {
        Self {
            filters: FilterSet::defaults(schema),
            metadata: Metadata::initial(now),
            ui: UiState::default(),
        }
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.metadata.version
    }

    /// Whether a conflict with `id` is currently surfaced.
    pub fn has_conflict(&self, id: &str) -> bool {
        self.ui.conflicts.iter().any(|c| c.id == id)
    }

    /// Decode a full state from JSON, strictly: any undecodable dimension,
    /// error, or conflict fails the whole decode. `ui` is optional.
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Self, StateError> {
        let obj = json
            .as_object()
            .ok_or_else(|| StateError::malformed("state", "not an object"))?;
        let filters_json = obj
            .get("filters")
            .ok_or_else(|| StateError::malformed("state", "missing filters"))?;
        let (filters, rejected) = FilterSet::decode(schema, filters_json)?;
        if let Some(first) = rejected.into_iter().next() {
            return Err(first.error.into());
        }
        let metadata: Metadata = obj
            .get("metadata")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StateError::malformed("metadata", e.to_string()))?
            .ok_or_else(|| StateError::malformed("state", "missing metadata"))?;
        if metadata.version == 0 {
            return Err(StateError::malformed("metadata", "version must be at least 1"));
        }
        let ui = match obj.get("ui") {
            None | Some(Value::Null) => UiState::default(),
            Some(ui) => decode_ui(schema, ui)?,
        };
        Ok(Self {
            filters,
            metadata,
            ui,
        })
    }
}

fn decode_ui(schema: &Schema, json: &Value) -> Result<UiState, StateError> {
    let is_loading = json
        .get("isLoading")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let errors: Vec<FilterError> = match json.get("errors") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| StateError::malformed("ui.errors", e.to_string()))?,
    };
    let conflicts = match json.get("conflicts") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|c| FilterConflict::from_json(schema, c))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(StateError::malformed("ui.conflicts", "not an array")),
    };
    Ok(UiState {
        is_loading,
        errors,
        conflicts,
    })
}
