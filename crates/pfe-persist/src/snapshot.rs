//! # Snapshot Codec
//!
//! The stored form of a state:
//!
//! ```text
//! {"formatVersion": 1, "filters": {...}, "metadata": {...}}
//! ```
//!
//! `ui` is transient and never stored. Decoding is lenient per dimension:
//! a dimension that fails to decode or validate is replaced by its empty
//! value and reported, never failing the whole snapshot. Only text that is
//! not a JSON object, or a newer `formatVersion`, is rejected outright.

use pfe_core::Clock;
use pfe_schema::Schema;
use pfe_state::{FilterSet, FilterState, Metadata, UiState};
use serde::Serialize;
use serde_json::Value;

use crate::error::PersistenceError;
use crate::report::{screen, DecodeReport};

/// Current snapshot layout version.
pub const SNAPSHOT_FORMAT_VERSION: u64 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    format_version: u64,
    filters: &'a FilterSet,
    metadata: &'a Metadata,
}

/// Serialize the durable part of `state`.
pub fn encode_snapshot(state: &FilterState) -> Result<String, PersistenceError> {
    let snapshot = SnapshotRef {
        format_version: SNAPSHOT_FORMAT_VERSION,
        filters: &state.filters,
        metadata: &state.metadata,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Decode a stored snapshot.
///
/// Missing or undecodable metadata is replaced by fresh metadata stamped
/// with `clock` and reported under `metadata`.
pub fn decode_snapshot(
    schema: &Schema,
    text: &str,
    clock: &dyn Clock,
) -> Result<(FilterState, DecodeReport), PersistenceError> {
    let json: Value = serde_json::from_str(text)?;
    let obj = json
        .as_object()
        .ok_or_else(|| PersistenceError::Snapshot("not a JSON object".into()))?;

    match obj.get("formatVersion").map(Value::as_u64) {
        None => {}
        Some(Some(v)) if v <= SNAPSHOT_FORMAT_VERSION => {}
        Some(other) => {
            return Err(PersistenceError::Snapshot(format!(
                "unsupported formatVersion {}",
                other.map(|v| v.to_string()).unwrap_or_else(|| "(non-integer)".into())
            )))
        }
    }

    let mut report = DecodeReport::default();
    let mut filters = match obj.get("filters") {
        Some(raw) => match FilterSet::decode(schema, raw) {
            Ok((set, rejected)) => {
                report.extend_rejected(rejected);
                set
            }
            Err(err) => {
                report.discard("filters", err.to_string());
                FilterSet::defaults(schema)
            }
        },
        None => {
            report.discard("filters", "missing");
            FilterSet::defaults(schema)
        }
    };
    screen(schema, &mut filters, &mut report);

    let metadata = match obj.get("metadata").cloned().map(serde_json::from_value::<Metadata>) {
        Some(Ok(meta)) if meta.version >= 1 => meta,
        Some(Ok(_)) => {
            report.discard("metadata", "version must be at least 1");
            Metadata::initial(clock.now())
        }
        Some(Err(err)) => {
            report.discard("metadata", err.to_string());
            Metadata::initial(clock.now())
        }
        None => {
            report.discard("metadata", "missing");
            Metadata::initial(clock.now())
        }
    };

    Ok((
        FilterState {
            filters,
            metadata,
            ui: UiState::default(),
        },
        report,
    ))
}
