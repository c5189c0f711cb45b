//! # Filter Set
//!
//! One value per dimension, always complete. A `FilterSet` is only ever
//! built from a [`Schema`], and every mutation goes through the table, so
//! a dimension can never be absent or hold a value of the wrong kind.

use std::collections::BTreeMap;

use pfe_core::FilterPath;
use pfe_schema::{FilterValue, Schema, SchemaError};
use serde::Serialize;
use serde_json::Value;

use crate::error::StateError;

/// The complete set of filter values, keyed by top-level dimension name.
///
/// Serializes as a plain JSON object in the canonical shape consumed by the
/// query layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

/// A dimension dropped while decoding a filter set.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedDimension {
    /// Key as it appeared in the input.
    pub key: String,
    /// Why it was dropped.
    pub error: SchemaError,
}

impl FilterSet {
    /// Every dimension at its canonical empty value.
    pub fn defaults(schema: &Schema) -> Self {
        Self {
            values: schema.default_values(),
        }
    }

    /// Value at a top-level or dotted path.
    pub fn get(&self, path: &FilterPath) -> Option<&FilterValue> {
        let mut segments = path.segments();
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            current = current.as_group()?.get(segment)?;
        }
        Some(current)
    }

    /// Value of a top-level dimension.
    pub fn dimension(&self, name: &str) -> Option<&FilterValue> {
        self.values.get(name)
    }

    /// Iterate over top-level dimensions.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.values.iter()
    }

    /// Replace the value at `path` wholesale.
    ///
    /// The path must resolve in `schema` and `value` must conform to the
    /// declared kind. Siblings of a group member are untouched.
    pub fn set(
        &mut self,
        schema: &Schema,
        path: &FilterPath,
        value: FilterValue,
    ) -> Result<(), StateError> {
        let spec = schema.resolve(path).ok_or_else(|| StateError::UnknownPath {
            path: path.to_string(),
        })?;
        if !spec.conforms(&value) {
            return Err(StateError::KindMismatch {
                path: path.to_string(),
                expected: spec.kind.value_kind(),
                found: value.kind(),
            });
        }
        let slot = self.slot_mut(schema, path)?;
        *slot = value;
        Ok(())
    }

    /// Reset the value at `path` to its canonical empty value.
    pub fn clear(&mut self, schema: &Schema, path: &FilterPath) -> Result<(), StateError> {
        let empty = schema.empty_value(path).ok_or_else(|| StateError::UnknownPath {
            path: path.to_string(),
        })?;
        self.set(schema, path, empty)
    }

    // A missing slot is repaired from the table so a set never fails on an
    // already-valid path.
    fn slot_mut(&mut self, schema: &Schema, path: &FilterPath) -> Result<&mut FilterValue, StateError> {
        let unknown = || StateError::UnknownPath {
            path: path.to_string(),
        };
        let mut segments = path.segments();
        let root = segments.next().ok_or_else(unknown)?;
        let root_spec = schema.dimension(root).ok_or_else(unknown)?;
        let mut current = self
            .values
            .entry(root.to_string())
            .or_insert_with(|| root_spec.empty_value());
        let mut spec = root_spec;
        for segment in segments {
            spec = spec.member(segment).ok_or_else(unknown)?;
            let group = current.as_group_mut().ok_or_else(unknown)?;
            current = group
                .entry(segment.to_string())
                .or_insert_with(|| spec.empty_value());
        }
        Ok(current)
    }

    /// Leaf paths holding a non-empty value, in table order.
    pub fn active_paths(&self, schema: &Schema) -> Vec<FilterPath> {
        schema
            .leaf_paths()
            .into_iter()
            .filter(|(path, _)| self.get(path).map(|v| !v.is_empty()).unwrap_or(false))
            .map(|(path, _)| path)
            .collect()
    }

    /// Whether every dimension is at its empty value.
    pub fn is_default(&self) -> bool {
        self.values.values().all(FilterValue::is_empty)
    }

    /// Whether every dimension in `schema` is present with a conforming value
    /// and no undeclared dimension is present.
    pub fn conforms(&self, schema: &Schema) -> bool {
        self.values.len() == schema.dimensions().len()
            && schema.dimensions().iter().all(|d| {
                self.values
                    .get(&d.name)
                    .map(|v| d.conforms(v))
                    .unwrap_or(false)
            })
    }

    /// Decode a JSON object dimension by dimension.
    ///
    /// Absent dimensions take their empty value. A dimension that fails to
    /// decode also takes its empty value and is reported; unknown keys are
    /// reported and ignored.
    pub fn decode(schema: &Schema, json: &Value) -> Result<(Self, Vec<RejectedDimension>), StateError> {
        let obj = json
            .as_object()
            .ok_or_else(|| StateError::malformed("filter set", format!("{json} is not an object")))?;
        let mut set = Self::defaults(schema);
        let mut rejected = Vec::new();
        for (key, raw) in obj {
            let path = match FilterPath::new(key.clone()) {
                Ok(p) if !p.is_nested() => p,
                _ => {
                    rejected.push(RejectedDimension {
                        key: key.clone(),
                        error: SchemaError::UnknownDimension { path: key.clone() },
                    });
                    continue;
                }
            };
            match schema.decode_value(&path, raw) {
                Ok(value) => {
                    set.values.insert(key.clone(), value);
                }
                Err(error) => {
                    tracing::debug!(dimension = %key, %error, "discarding undecodable dimension");
                    rejected.push(RejectedDimension {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }
        Ok((set, rejected))
    }
}
