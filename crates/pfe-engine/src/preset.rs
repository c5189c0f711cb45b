//! # Preset Catalog
//!
//! Named bundles of filter values applied with `MERGE_FILTERS` and source
//! `preset`. A catalog is YAML:
//!
//! ```yaml
//! presets:
//!   - id: watchlist
//!     name: Watchlist
//!     filters:
//!       riskGrades: [CM6, CM7]
//!       complianceStatus:
//!         gst: [Cancelled]
//! ```
//!
//! Keys are top-level dimensions, matching the shallow merge. Decoding is
//! strict: a preset whose keys or values do not fit the table fails the
//! whole catalog, unlike persisted state.

use std::collections::BTreeMap;
use std::path::Path;

use pfe_core::FilterPath;
use pfe_schema::{FilterValue, Schema};
use pfe_validate::validate_field;
use serde::{Deserialize, Serialize};

use crate::error::PresetError;

const BUILTIN: &str = include_str!("../presets/builtin.yaml");

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    presets: Vec<RawPreset>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPreset {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    filters: BTreeMap<String, serde_json::Value>,
}

/// One named preset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    /// Stable id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Path to value, ready for `MERGE_FILTERS`.
    pub filters: BTreeMap<String, FilterValue>,
}

/// An ordered, id-unique set of presets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin(schema: &Schema) -> Result<Self, PresetError> {
        Self::from_yaml(schema, BUILTIN)
    }

    /// Read a catalog file.
    pub fn load(schema: &Schema, path: &Path) -> Result<Self, PresetError> {
        let text = std::fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(schema, &text)
    }

    /// Parse and decode a catalog.
    pub fn from_yaml(schema: &Schema, text: &str) -> Result<Self, PresetError> {
        let raw: RawCatalog = serde_yaml::from_str(text).map_err(|e| PresetError::Parse(e.to_string()))?;
        let mut presets: Vec<Preset> = Vec::with_capacity(raw.presets.len());
        for p in raw.presets {
            if presets.iter().any(|existing| existing.id == p.id) {
                return Err(PresetError::DuplicateId(p.id));
            }
            let filters = decode_filters(schema, &p.id, p.filters)?;
            presets.push(Preset {
                id: p.id,
                name: p.name,
                description: p.description,
                filters,
            });
        }
        tracing::debug!(count = presets.len(), "preset catalog loaded");
        Ok(Self { presets })
    }

    /// The preset with `id`.
    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Presets in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    /// Number of presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn decode_filters(
    schema: &Schema,
    preset: &str,
    raw: BTreeMap<String, serde_json::Value>,
) -> Result<BTreeMap<String, FilterValue>, PresetError> {
    let invalid = |path: &str, reason: String| PresetError::InvalidFilter {
        preset: preset.to_string(),
        path: path.to_string(),
        reason,
    };
    let mut out = BTreeMap::new();
    for (key, json) in raw {
        let path = FilterPath::new(key.clone()).map_err(|e| invalid(&key, e.to_string()))?;
        if path.is_nested() {
            return Err(invalid(&key, "presets set whole dimensions; nest the member under its group".into()));
        }
        let value = schema
            .decode_value(&path, &json)
            .map_err(|e| invalid(&key, e.to_string()))?;
        let outcome = validate_field(schema, &path, &value);
        if let Some(err) = outcome.errors.iter().find(|e| e.is_error()) {
            return Err(invalid(&key, format!("{}: {}", err.code, err.message)));
        }
        out.insert(key, value);
    }
    Ok(out)
}
