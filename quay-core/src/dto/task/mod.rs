//! Task DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::{PipelineRef, VersionSpec};
use crate::domain::task::{Task, TaskStatus};

/// Request to submit a new task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub pipeline: PipelineRef,
    pub job_descriptor: String,
    #[serde(default)]
    pub definition: serde_json::Value,
    /// Must be the initial state when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Status report for an existing task, located by pipeline and descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTask {
    pub pipeline: PipelineRef,
    pub job_descriptor: String,
    pub status: TaskStatus,
}

/// Query string of the claim endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimQuery {
    /// Maximum number of tasks to claim, defaults to 1
    pub num_tasks: Option<i64>,
}

/// Query filter for listing tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub pipeline_name: Option<String>,
    pub pipeline_version: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let version = match &task.pipeline.version {
            VersionSpec::Exact(v) => v.as_str(),
            VersionSpec::Latest => "",
        };

        self.pipeline_name
            .as_ref()
            .is_none_or(|n| *n == task.pipeline.name)
            && self.pipeline_version.as_ref().is_none_or(|v| v == version)
            && self.status.as_ref().is_none_or(|s| *s == task.status)
    }
}
