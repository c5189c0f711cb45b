//! Session-start rehydration.

use pfe_core::Clock;
use pfe_schema::Schema;
use pfe_state::FilterState;
use serde::Serialize;

use crate::config::PersistenceConfig;
use crate::query::decode_query;
use crate::report::DecodeReport;
use crate::snapshot::decode_snapshot;
use crate::store::{AddressBar, StateStore};

/// Where a rehydrated state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOrigin {
    /// Address-bar query parameters.
    Query,
    /// The stored session snapshot.
    Storage,
}

/// A rehydrated state with what was discarded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedState {
    /// The decoded state.
    pub state: FilterState,
    /// Its source.
    pub origin: LoadOrigin,
    /// Dimensions and parameters dropped while decoding.
    pub report: DecodeReport,
}

/// Rehydrate from the highest-priority enabled source.
///
/// Filter parameters in the address bar win over the stored snapshot. A
/// source that is disabled, empty, or unreadable as a whole is skipped; an
/// individual bad dimension is discarded and reported instead. Returns
/// `None` when neither source yields a state.
pub fn load_state(
    config: &PersistenceConfig,
    schema: &Schema,
    store: &dyn StateStore,
    bar: &dyn AddressBar,
    clock: &dyn Clock,
) -> Option<LoadedState> {
    if config.query_enabled {
        if let Some((state, report)) = decode_query(schema, &bar.query(), &config.query_prefix, clock) {
            tracing::info!(discarded = report.discarded.len(), "filter state loaded from query string");
            return Some(LoadedState {
                state,
                origin: LoadOrigin::Query,
                report,
            });
        }
    }

    if !config.storage_enabled {
        return None;
    }
    let text = match store.read(&config.storage_key) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(key = %config.storage_key, %err, "stored filter state unreadable");
            return None;
        }
    };
    match decode_snapshot(schema, &text, clock) {
        Ok((state, report)) => {
            tracing::info!(
                version = state.version(),
                discarded = report.discarded.len(),
                "filter state loaded from storage"
            );
            Some(LoadedState {
                state,
                origin: LoadOrigin::Storage,
                report,
            })
        }
        Err(err) => {
            tracing::warn!(key = %config.storage_key, %err, "stored filter state discarded");
            None
        }
    }
}
