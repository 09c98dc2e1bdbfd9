//! Task endpoints

use quay_core::domain::event::TaskEvent;
use quay_core::domain::pipeline::PipelineRef;
use quay_core::domain::task::Task;
use quay_core::dto::task::{ClaimQuery, CreateTask, TaskFilter, UpdateTask};

use crate::QuayClient;
use crate::error::Result;

impl QuayClient {
    /// Submit a new task; the server stores it as PENDING
    pub async fn create_task(&self, req: &CreateTask) -> Result<Task> {
        let request = self.client.post(self.url("/tasks")).json(req);
        let response = self.identified(request).send().await?;

        self.handle_response(response).await
    }

    /// Overwrite the status of the task identified by pipeline and descriptor
    pub async fn update_task(&self, req: &UpdateTask) -> Result<Task> {
        let request = self.client.put(self.url("/tasks")).json(req);
        let response = self.identified(request).send().await?;

        self.handle_response(response).await
    }

    /// Claim up to `num_tasks` pending tasks of `pipeline`
    ///
    /// An empty list means nothing was available; it is not an error.
    pub async fn claim_tasks(&self, pipeline: &PipelineRef, num_tasks: i64) -> Result<Vec<Task>> {
        tracing::debug!("Claiming up to {} task(s) from {}", num_tasks, pipeline);

        let request = self
            .client
            .post(self.url("/tasks/claim"))
            .query(&ClaimQuery {
                num_tasks: Some(num_tasks),
            })
            .json(pipeline);
        let response = self.identified(request).send().await?;

        self.handle_response(response).await
    }

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let response = self
            .client
            .get(self.url("/tasks"))
            .query(filter)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Audit trail of a task, oldest first
    pub async fn task_events(&self, task_id: i64) -> Result<Vec<TaskEvent>> {
        let response = self
            .client
            .get(self.url(&format!("/tasks/{}/events", task_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
