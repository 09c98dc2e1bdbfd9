//! Task domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::pipeline::PipelineRef;

/// A unit of work belonging to one pipeline version
///
/// `(pipeline, job_descriptor)` is unique across all tasks. `claimed_by` is
/// set once the task leaves the pending state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub pipeline: PipelineRef,
    pub job_descriptor: String,
    pub definition: serde_json::Value,
    pub status: TaskStatus,
    pub claimed_by: Option<AgentId>,
    pub prefix: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Task {
    /// Pending and unclaimed
    pub fn is_eligible(&self) -> bool {
        self.status.is_pending() && self.claimed_by.is_none()
    }
}

pub const PENDING: &str = "PENDING";
pub const CLAIMED: &str = "CLAIMED";
pub const RUNNING: &str = "RUNNING";
pub const DONE: &str = "DONE";
pub const FAILED: &str = "FAILED";
pub const CANCELLED: &str = "CANCELLED";

/// Task lifecycle state
///
/// Only `PENDING` and `CLAIMED` mean anything to the claim protocol. Agents
/// may report any other tag, so the status is an open, upper-cased token
/// checked only for shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskStatus(String);

impl TaskStatus {
    pub const MAX_LEN: usize = 50;

    pub fn parse(raw: &str) -> Result<Self, InvalidStatus> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(InvalidStatus("status cannot be empty".to_string()));
        }

        if trimmed.len() > Self::MAX_LEN {
            return Err(InvalidStatus(format!(
                "status is too long (max {} characters)",
                Self::MAX_LEN
            )));
        }

        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(InvalidStatus(format!(
                "status '{}' may only contain letters, digits, '_' and '-'",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn pending() -> Self {
        Self(PENDING.to_string())
    }

    pub fn claimed() -> Self {
        Self(CLAIMED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_pending(&self) -> bool {
        self.0 == PENDING
    }

    pub fn is_claimed(&self) -> bool {
        self.0 == CLAIMED
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = InvalidStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.0
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A status tag that failed the shape check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid task status: {}", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_normalized() {
        let status = TaskStatus::parse(" pending ").unwrap();
        assert_eq!(status, TaskStatus::pending());
        assert!(status.is_pending());
    }

    #[test]
    fn test_status_accepts_open_vocabulary() {
        let status = TaskStatus::parse("waiting-for-input").unwrap();
        assert_eq!(status.as_str(), "WAITING-FOR-INPUT");
        assert!(!status.is_pending());
        assert!(!status.is_claimed());
    }

    #[test]
    fn test_status_rejects_malformed() {
        assert!(TaskStatus::parse("").is_err());
        assert!(TaskStatus::parse("   ").is_err());
        assert!(TaskStatus::parse("two words").is_err());
        assert!(TaskStatus::parse(&"X".repeat(51)).is_err());
    }

    #[test]
    fn test_status_deserialization_validates() {
        let ok: TaskStatus = serde_json::from_str(r#""done""#).unwrap();
        assert_eq!(ok.as_str(), DONE);

        let bad: Result<TaskStatus, _> = serde_json::from_str(r#""""#);
        assert!(bad.is_err());
    }
}
