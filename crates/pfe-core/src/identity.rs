//! # Session Identity
//!
//! One engine instance exists per filtering session. The session id tags
//! log lines and keeps two sessions' diagnostics apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a filtering session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_display_prefix() {
        let id = SessionId::new();
        assert!(id.to_string().starts_with("session:"));
    }
}
