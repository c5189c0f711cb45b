//! # Kind Checks
//!
//! Every dimension kind maps to a small JSON-Schema fragment (Draft 2020-12).
//! Untrusted JSON (stored snapshots, external actions, preset files) is
//! checked against that fragment before typed decoding, so a malformed
//! fragment is rejected with structured violations naming the offending
//! location rather than a bare deserialization message.
//!
//! The fragments check shape only. Vocabulary membership, domain bounds and
//! length limits are field-validation concerns and are reported there with
//! their own codes.

use std::collections::HashMap;

use jsonschema::Validator;
use pfe_core::FilterPath;
use serde_json::{json, Map, Value};

use crate::error::{SchemaError, Violation};
use crate::kind::DimensionKind;
use crate::table::{DimensionSpec, Schema};

/// The JSON-Schema fragment describing `spec`'s kind.
///
/// Group members are optional in the fragment; missing members decode to
/// their empty value.
pub fn kind_schema(spec: &DimensionSpec) -> Value {
    match &spec.kind {
        DimensionKind::List { .. } => json!({
            "type": "array",
            "items": { "type": "string" }
        }),
        DimensionKind::Range { .. } => json!({
            "type": "object",
            "properties": {
                "min": { "type": ["number", "null"] },
                "max": { "type": ["number", "null"] }
            },
            "additionalProperties": false
        }),
        DimensionKind::DateRange => json!({
            "type": "object",
            "properties": {
                "startDate": { "type": ["string", "null"] },
                "endDate": { "type": ["string", "null"] }
            },
            "additionalProperties": false
        }),
        DimensionKind::Text { .. } => json!({ "type": "string" }),
        DimensionKind::Group { members } => {
            let properties: Map<String, Value> = members
                .iter()
                .map(|m| (m.name.clone(), kind_schema(m)))
                .collect();
            json!({
                "type": "object",
                "properties": properties,
                "additionalProperties": false
            })
        }
    }
}

fn compile(path: &str, spec: &DimensionSpec) -> Result<Validator, SchemaError> {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.build(&kind_schema(spec))
        .map_err(|e| SchemaError::CheckerBuild {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

fn collect_violations(validator: &Validator, instance: &Value) -> Vec<Violation> {
    validator
        .iter_errors(instance)
        .map(|e| Violation {
            instance_path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect()
}

/// Check a single fragment against `spec` with a one-off compiled validator.
pub(crate) fn check_once(
    path: &FilterPath,
    spec: &DimensionSpec,
    instance: &Value,
) -> Result<(), SchemaError> {
    let validator = compile(path.as_str(), spec)?;
    let violations = collect_violations(&validator, instance);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::KindMismatch {
            path: path.to_string(),
            violations,
        })
    }
}

/// Compiled kind validators for every path in a table.
///
/// Build once and reuse when decoding many fragments (a whole snapshot, a
/// preset catalog).
pub struct KindChecker {
    schema: Schema,
    validators: HashMap<String, Validator>,
}

impl std::fmt::Debug for KindChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut paths: Vec<&String> = self.validators.keys().collect();
        paths.sort();
        f.debug_struct("KindChecker").field("paths", &paths).finish()
    }
}

impl KindChecker {
    /// Compile validators for every top-level dimension and every group member.
    pub fn new(schema: &Schema) -> Result<Self, SchemaError> {
        let mut validators = HashMap::new();
        for dim in schema.dimensions() {
            compile_tree(&dim.name, dim, &mut validators)?;
        }
        Ok(Self {
            schema: schema.clone(),
            validators,
        })
    }

    /// The table the checker was compiled from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Check `instance` against the kind declared at `path`.
    pub fn check(&self, path: &FilterPath, instance: &Value) -> Result<(), SchemaError> {
        let validator =
            self.validators
                .get(path.as_str())
                .ok_or_else(|| SchemaError::UnknownDimension {
                    path: path.to_string(),
                })?;
        let violations = collect_violations(validator, instance);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::KindMismatch {
                path: path.to_string(),
                violations,
            })
        }
    }

    /// Check, then decode into a typed value.
    pub fn decode(
        &self,
        path: &FilterPath,
        instance: &Value,
    ) -> Result<crate::value::FilterValue, SchemaError> {
        self.check(path, instance)?;
        let spec = self
            .schema
            .resolve(path)
            .ok_or_else(|| SchemaError::UnknownDimension {
                path: path.to_string(),
            })?;
        crate::decode::decode_typed(path, spec, instance)
    }
}

fn compile_tree(
    path: &str,
    spec: &DimensionSpec,
    out: &mut HashMap<String, Validator>,
) -> Result<(), SchemaError> {
    out.insert(path.to_string(), compile(path, spec)?);
    if let DimensionKind::Group { members } = &spec.kind {
        for member in members {
            compile_tree(&format!("{path}.{}", member.name), member, out)?;
        }
    }
    Ok(())
}
