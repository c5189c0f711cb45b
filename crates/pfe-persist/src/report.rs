//! Per-dimension decode reporting.

use std::collections::HashSet;

use pfe_core::FilterPath;
use pfe_schema::Schema;
use pfe_state::{FilterSet, RejectedDimension};
use pfe_validate::validate_field;
use serde::Serialize;

/// A dimension (or other field) dropped while decoding persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedField {
    /// Dimension path, parameter name, or `metadata`.
    pub field: String,
    /// Why it was dropped.
    pub reason: String,
}

/// Everything a lenient decode threw away.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecodeReport {
    /// Dropped fields in detection order.
    pub discarded: Vec<DiscardedField>,
}

impl DecodeReport {
    /// Nothing was dropped.
    pub fn is_clean(&self) -> bool {
        self.discarded.is_empty()
    }

    pub(crate) fn discard(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        let field = field.into();
        let reason = reason.into();
        tracing::warn!(%field, %reason, "discarding persisted filter field");
        self.discarded.push(DiscardedField { field, reason });
    }

    pub(crate) fn extend_rejected(&mut self, rejected: Vec<RejectedDimension>) {
        for r in rejected {
            self.discard(r.key, r.error.to_string());
        }
    }
}

/// Clear every dimension (or group member) whose decoded value fails field
/// validation, recording it in `report`.
pub(crate) fn screen(schema: &Schema, filters: &mut FilterSet, report: &mut DecodeReport) {
    let dims: Vec<String> = schema.dimensions().iter().map(|d| d.name.clone()).collect();
    let mut cleared = HashSet::new();
    for name in dims {
        let Ok(path) = FilterPath::new(name) else { continue };
        let Some(value) = filters.get(&path) else { continue };
        let outcome = validate_field(schema, &path, value);
        for error in outcome.errors.into_iter().filter(|e| e.is_error()) {
            let target = FilterPath::new(error.filter_type.clone()).unwrap_or_else(|_| path.clone());
            if cleared.contains(&target) {
                continue;
            }
            if filters.clear(schema, &target).is_ok() {
                cleared.insert(target.clone());
                report.discard(target.to_string(), format!("{}: {}", error.code, error.message));
            }
        }
    }
}
