//! Agent identity
//!
//! Agents are not modeled entities. The identity is an opaque token handed to
//! the service by whatever authenticates the caller, and is recorded on tasks
//! for exclusivity and audit.

use serde::{Deserialize, Serialize};

/// Opaque identity of the caller acting on a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Longest identity the store can record
    pub const MAX_LEN: usize = 255;

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the token carries no usable identity
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn is_too_long(&self) -> bool {
        self.0.len() > Self::MAX_LEN
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
