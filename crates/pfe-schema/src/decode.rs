//! Schema-directed decoding of JSON fragments into [`FilterValue`]s.
//!
//! The declared kind at a path, never the runtime shape of the fragment,
//! decides how it is read.

use chrono::{DateTime, NaiveDate};
use pfe_core::FilterPath;
use serde_json::Value;

use crate::check::check_once;
use crate::error::{SchemaError, Violation};
use crate::kind::DimensionKind;
use crate::table::{DimensionSpec, Schema};
use crate::value::{DateBounds, FilterValue, RangeBounds};

impl Schema {
    /// Decode `json` as the value of the dimension at `path`.
    ///
    /// The fragment is first checked against the kind's JSON-Schema fragment;
    /// group members missing from the fragment take their empty value.
    pub fn decode_value(&self, path: &FilterPath, json: &Value) -> Result<FilterValue, SchemaError> {
        let spec = self
            .resolve(path)
            .ok_or_else(|| SchemaError::UnknownDimension {
                path: path.to_string(),
            })?;
        check_once(path, spec, json)?;
        decode_typed(path, spec, json)
    }
}

fn mismatch(path: &FilterPath, pointer: &str, message: String) -> SchemaError {
    SchemaError::KindMismatch {
        path: path.to_string(),
        violations: vec![Violation {
            instance_path: pointer.to_string(),
            message,
        }],
    }
}

/// Typed decode of a fragment already known to match the kind's shape.
///
/// Shape errors are still reported (as a single violation) so the function
/// is safe on unchecked input.
pub(crate) fn decode_typed(
    path: &FilterPath,
    spec: &DimensionSpec,
    json: &Value,
) -> Result<FilterValue, SchemaError> {
    match &spec.kind {
        DimensionKind::List { .. } => {
            let items = json
                .as_array()
                .ok_or_else(|| mismatch(path, "", format!("{json} is not of type \"array\"")))?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let s = item.as_str().ok_or_else(|| {
                    mismatch(path, &format!("/{i}"), format!("{item} is not of type \"string\""))
                })?;
                out.push(s.to_string());
            }
            Ok(FilterValue::List(out))
        }
        DimensionKind::Range { .. } => {
            let obj = json
                .as_object()
                .ok_or_else(|| mismatch(path, "", format!("{json} is not of type \"object\"")))?;
            let bound = |key: &str| -> Result<Option<f64>, SchemaError> {
                match obj.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                        mismatch(path, &format!("/{key}"), format!("{v} is not of type \"number\""))
                    }),
                }
            };
            Ok(FilterValue::Range(RangeBounds::new(bound("min")?, bound("max")?)))
        }
        DimensionKind::DateRange => {
            let obj = json
                .as_object()
                .ok_or_else(|| mismatch(path, "", format!("{json} is not of type \"object\"")))?;
            let end = |key: &str| -> Result<Option<NaiveDate>, SchemaError> {
                match obj.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(Value::String(s)) if s.is_empty() => Ok(None),
                    Some(Value::String(s)) => parse_date(s).map(Some).ok_or_else(|| {
                        SchemaError::InvalidValue {
                            path: path.to_string(),
                            reason: format!("{key} {s:?} is not an ISO-8601 date"),
                        }
                    }),
                    Some(v) => Err(mismatch(
                        path,
                        &format!("/{key}"),
                        format!("{v} is not of type \"string\""),
                    )),
                }
            };
            Ok(FilterValue::DateRange(DateBounds::new(
                end("startDate")?,
                end("endDate")?,
            )))
        }
        DimensionKind::Text { .. } => json
            .as_str()
            .map(FilterValue::text)
            .ok_or_else(|| mismatch(path, "", format!("{json} is not of type \"string\""))),
        DimensionKind::Group { members } => {
            let obj = json
                .as_object()
                .ok_or_else(|| mismatch(path, "", format!("{json} is not of type \"object\"")))?;
            if let Some(extra) = obj.keys().find(|k| !members.iter().any(|m| &m.name == *k)) {
                return Err(mismatch(
                    path,
                    "",
                    format!("additional property {extra:?} is not a member"),
                ));
            }
            let mut out = std::collections::BTreeMap::new();
            for member in members {
                let child = path.child(&member.name).map_err(|e| SchemaError::InvalidValue {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
                let value = match obj.get(&member.name) {
                    Some(v) => decode_typed(&child, member, v)?,
                    None => member.empty_value(),
                };
                out.insert(member.name.clone(), value);
            }
            Ok(FilterValue::Group(out))
        }
    }
}

/// Accepts a plain `YYYY-MM-DD` date or an RFC 3339 timestamp (date part kept).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}
