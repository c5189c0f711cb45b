//! Write targets for settled states.

use std::sync::Arc;

use pfe_schema::Schema;
use pfe_state::FilterState;

use crate::config::PersistenceConfig;
use crate::error::PersistenceError;
use crate::query::merge_query;
use crate::snapshot::encode_snapshot;
use crate::store::{AddressBar, StateStore};

/// Somewhere a settled state is mirrored to.
pub trait StateSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;
    /// Mirror `state`.
    fn write(&self, state: &FilterState) -> Result<(), PersistenceError>;
}

/// Writes the snapshot form into a [`StateStore`].
pub struct StorageSink {
    store: Arc<dyn StateStore>,
    key: String,
}

impl StorageSink {
    /// Write under `key` in `store`.
    pub fn new(store: Arc<dyn StateStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl StateSink for StorageSink {
    fn name(&self) -> &str {
        "storage"
    }

    fn write(&self, state: &FilterState) -> Result<(), PersistenceError> {
        let text = encode_snapshot(state)?;
        self.store.write(&self.key, &text)
    }
}

/// Rewrites the filter parameters of an [`AddressBar`], leaving every other
/// parameter in place.
pub struct QuerySink {
    bar: Arc<dyn AddressBar>,
    schema: Arc<Schema>,
    prefix: String,
}

impl QuerySink {
    /// Write `{prefix}*` parameters into `bar`.
    pub fn new(bar: Arc<dyn AddressBar>, schema: Arc<Schema>, prefix: impl Into<String>) -> Self {
        Self {
            bar,
            schema,
            prefix: prefix.into(),
        }
    }
}

impl StateSink for QuerySink {
    fn name(&self) -> &str {
        "query"
    }

    fn write(&self, state: &FilterState) -> Result<(), PersistenceError> {
        let next = merge_query(&self.bar.query(), &self.schema, state, &self.prefix);
        self.bar.replace_query(&next)
    }
}

/// The sinks enabled by `config`, storage first.
pub fn sinks_for(
    config: &PersistenceConfig,
    schema: Arc<Schema>,
    store: Arc<dyn StateStore>,
    bar: Arc<dyn AddressBar>,
) -> Vec<Arc<dyn StateSink>> {
    let mut sinks: Vec<Arc<dyn StateSink>> = Vec::new();
    if config.storage_enabled {
        sinks.push(Arc::new(StorageSink::new(store, config.storage_key.clone())));
    }
    if config.query_enabled {
        sinks.push(Arc::new(QuerySink::new(bar, schema, config.query_prefix.clone())));
    }
    sinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryAddressBar, MemoryStore};
    use pfe_core::{FilterPath, FilterSource, FixedClock, Timestamp};
    use pfe_schema::FilterValue;
    use pfe_state::{FilterAction, Reducer};

    fn state() -> (Reducer, FilterState) {
        let clock = FixedClock::new(Timestamp::parse("2025-01-15T09:30:00Z").unwrap());
        let r = Reducer::new(Arc::new(Schema::portfolio()), Arc::new(clock));
        let s = r.reduce(
            &r.initial_state(),
            &FilterAction::update(
                FilterPath::new("regions").unwrap(),
                FilterValue::list(["east"]),
                FilterSource::Manual,
            ),
        );
        (r, s)
    }

    #[test]
    fn test_enabled_sinks_follow_config() {
        let schema = Arc::new(Schema::portfolio());
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let bar: Arc<dyn AddressBar> = Arc::new(MemoryAddressBar::default());
        let names = |c: &PersistenceConfig| -> Vec<String> {
            sinks_for(c, schema.clone(), store.clone(), bar.clone())
                .iter()
                .map(|s| s.name().to_string())
                .collect()
        };
        assert_eq!(names(&PersistenceConfig::default()), vec!["storage", "query"]);
        assert!(names(&PersistenceConfig::disabled()).is_empty());
    }

    #[test]
    fn test_storage_sink_writes_snapshot() {
        let (_, s) = state();
        let store = MemoryStore::new();
        StorageSink::new(Arc::new(store.clone()), "portfolio-filters").write(&s).unwrap();
        let text = store.read("portfolio-filters").unwrap().unwrap();
        assert!(text.contains("\"regions\":[\"east\"]"));
    }

    #[test]
    fn test_query_sink_keeps_other_params() {
        let (r, s) = state();
        let bar = MemoryAddressBar::new("view=grid&f_riskGrades=CM1");
        QuerySink::new(Arc::new(bar.clone()), r.schema_arc(), "f_").write(&s).unwrap();
        assert_eq!(bar.query(), "view=grid&f_regions=east");
    }
}
