//! # pfe-persist: Persistence & Synchronization
//!
//! Mirrors filter state to two surfaces and reads it back at session start:
//!
//! - **storage**: a JSON snapshot under a configurable key in a
//!   session-scoped [`StateStore`];
//! - **query string**: `{prefix}{path}` parameters in an [`AddressBar`].
//!
//! Decoding on either surface is per dimension: one corrupt field is
//! replaced by its empty value and recorded in a [`DecodeReport`], and the
//! rest of the state survives. Writes go through a [`DebouncedWriter`] so a
//! burst of edits produces a single write of the final state.

pub mod config;
pub mod error;
pub mod load;
pub mod query;
pub mod report;
pub mod sink;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use config::{PersistenceConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_QUERY_PREFIX, DEFAULT_STORAGE_KEY};
pub use error::PersistenceError;
pub use load::{load_state, LoadOrigin, LoadedState};
pub use query::{decode_query, encode_query, merge_query};
pub use report::{DecodeReport, DiscardedField};
pub use sink::{sinks_for, QuerySink, StateSink, StorageSink};
pub use snapshot::{decode_snapshot, encode_snapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{AddressBar, FileStore, MemoryAddressBar, MemoryStore, StateStore};
pub use writer::{DebouncedWriter, WriterStats};
