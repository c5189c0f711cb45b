//! Persistence configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default storage key.
pub const DEFAULT_STORAGE_KEY: &str = "portfolio-filters";

/// Default query parameter prefix.
pub const DEFAULT_QUERY_PREFIX: &str = "f_";

/// Default debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Where and how state is mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Key of the stored snapshot.
    pub storage_key: String,
    /// Prefix of every filter query parameter.
    pub query_prefix: String,
    /// Mirror to the key-value store.
    pub storage_enabled: bool,
    /// Mirror to the address-bar query string.
    pub query_enabled: bool,
    /// Debounce window in milliseconds.
    ///
    /// A save resets the timer; only the last state in a burst is written.
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            query_prefix: DEFAULT_QUERY_PREFIX.to_string(),
            storage_enabled: true,
            query_enabled: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl PersistenceConfig {
    /// Neither sink enabled.
    pub fn disabled() -> Self {
        Self {
            storage_enabled: false,
            query_enabled: false,
            ..Default::default()
        }
    }

    /// The debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Human-readable problems with this configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.storage_enabled && self.storage_key.trim().is_empty() {
            problems.push("persistence.storage_key must not be empty".to_string());
        }
        if self.query_enabled && self.query_prefix.is_empty() {
            problems.push("persistence.query_prefix must not be empty".to_string());
        }
        if self
            .query_prefix
            .chars()
            .any(|c| matches!(c, '&' | '=' | '#' | '?' | ' '))
        {
            problems.push(format!(
                "persistence.query_prefix {:?} contains a reserved character",
                self.query_prefix
            ));
        }
        if self.debounce_ms > 10_000 {
            problems.push(format!(
                "persistence.debounce_ms {} exceeds 10000",
                self.debounce_ms
            ));
        }
        problems
    }
}
