//! Task audit events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentId;
use crate::domain::task::TaskStatus;

/// A recorded change to a task, attributed to the agent that made it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: i64,
    pub task_id: i64,
    pub agent_id: AgentId,
    pub change: String,
    pub recorded_at: DateTime<Utc>,
}

pub const CREATED: &str = "Created";
pub const CLAIMED: &str = "Claimed";

/// Change description recorded when an agent moves a task to `status`
pub fn status_change(status: &TaskStatus) -> String {
    format!("Task changed, new status {}", status)
}
