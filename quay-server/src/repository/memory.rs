//! In-memory store
//!
//! Implements both repositories over a single lock-protected state. Reads
//! take the read lock; every write, including the commit-time re-check of a
//! reservation, happens under the write lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use quay_core::domain::agent::AgentId;
use quay_core::domain::event::{self, TaskEvent};
use quay_core::domain::pipeline::Pipeline;
use quay_core::domain::task::{Task, TaskStatus};
use quay_core::dto::pipeline::{PipelineFilter, RegisterPipeline};
use quay_core::dto::task::TaskFilter;
use tokio::sync::RwLock;

use super::{
    NewTask, PipelineRepository, Reservation, StoreError, StoreResult, TaskRepository,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Default)]
struct State {
    pipelines: Vec<Pipeline>,
    current: HashMap<String, String>,
    tasks: BTreeMap<i64, StoredTask>,
    events: Vec<TaskEvent>,
    next_task_id: i64,
    next_event_id: i64,
}

struct StoredTask {
    pipeline_id: i64,
    task: Task,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn pipeline(&self, name: &str, version: &str) -> Option<&Pipeline> {
        self.pipelines
            .iter()
            .find(|p| p.name == name && p.version == version)
    }

    fn record_event(&mut self, task_id: i64, agent: &AgentId, change: String) {
        self.next_event_id += 1;
        self.events.push(TaskEvent {
            id: self.next_event_id,
            task_id,
            agent_id: agent.clone(),
            change,
            recorded_at: Utc::now(),
        });
    }

    /// Tasks in creation order
    fn ordered_tasks(&self) -> Vec<&StoredTask> {
        let mut tasks: Vec<&StoredTask> = self.tasks.values().collect();
        tasks.sort_by_key(|t| (t.task.created, t.task.id));
        tasks
    }
}

#[async_trait]
impl PipelineRepository for MemoryStore {
    async fn register(&self, req: &RegisterPipeline) -> StoreResult<Pipeline> {
        let mut state = self.state.write().await;

        if state.pipeline(&req.name, &req.version).is_some() {
            return Err(StoreError::Duplicate(format!(
                "pipeline {}@{} already exists",
                req.name, req.version
            )));
        }

        let pipeline = Pipeline {
            id: state.pipelines.len() as i64 + 1,
            name: req.name.clone(),
            version: req.version.clone(),
            uri: req.uri.clone(),
            created_at: Utc::now(),
        };
        state.pipelines.push(pipeline.clone());

        if req.make_current {
            state.current.insert(req.name.clone(), req.version.clone());
        }

        Ok(pipeline)
    }

    async fn find(&self, name: &str, version: &str) -> StoreResult<Option<Pipeline>> {
        let state = self.state.read().await;
        Ok(state.pipeline(name, version).cloned())
    }

    async fn find_current(&self, name: &str) -> StoreResult<Option<Pipeline>> {
        let state = self.state.read().await;
        Ok(state
            .current
            .get(name)
            .and_then(|version| state.pipeline(name, version))
            .cloned())
    }

    async fn versions(&self, name: &str) -> StoreResult<Vec<Pipeline>> {
        let state = self.state.read().await;
        Ok(state
            .pipelines
            .iter()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &PipelineFilter) -> StoreResult<Vec<Pipeline>> {
        let state = self.state.read().await;
        let mut pipelines: Vec<Pipeline> = state
            .pipelines
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(pipelines)
    }

    async fn set_current(&self, name: &str, version: &str) -> StoreResult<bool> {
        let mut state = self.state.write().await;

        if state.pipeline(name, version).is_none() {
            return Ok(false);
        }

        state.current.insert(name.to_string(), version.to_string());
        Ok(true)
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn insert(
        &self,
        pipeline: &Pipeline,
        new_task: NewTask,
        agent: &AgentId,
    ) -> StoreResult<Task> {
        let mut state = self.state.write().await;

        let duplicate = state.tasks.values().any(|t| {
            t.pipeline_id == pipeline.id && t.task.job_descriptor == new_task.job_descriptor
        });
        if duplicate {
            return Err(StoreError::Duplicate(format!(
                "task {} already exists for pipeline {}@{}",
                new_task.job_descriptor, pipeline.name, pipeline.version
            )));
        }

        state.next_task_id += 1;
        let now = Utc::now();
        let task = Task {
            id: state.next_task_id,
            pipeline: pipeline.to_ref(),
            job_descriptor: new_task.job_descriptor,
            definition: new_task.definition,
            status: TaskStatus::pending(),
            claimed_by: None,
            prefix: new_task.prefix,
            created: now,
            updated: now,
        };

        state.tasks.insert(
            task.id,
            StoredTask {
                pipeline_id: pipeline.id,
                task: task.clone(),
            },
        );
        state.record_event(task.id, agent, event::CREATED.to_string());

        Ok(task)
    }

    async fn select_eligible(&self, pipeline: &Pipeline, limit: usize) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        Ok(state
            .ordered_tasks()
            .into_iter()
            .filter(|t| t.pipeline_id == pipeline.id && t.task.is_eligible())
            .take(limit)
            .map(|t| t.task.clone())
            .collect())
    }

    async fn reserve(&self, task_ids: &[i64], agent: &AgentId) -> StoreResult<Reservation> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut reservation = Reservation::default();

        for id in task_ids {
            let Some(stored) = state.tasks.get_mut(id) else {
                reservation.lost += 1;
                continue;
            };

            if !stored.task.is_eligible() {
                reservation.lost += 1;
                continue;
            }

            stored.task.status = TaskStatus::claimed();
            stored.task.claimed_by = Some(agent.clone());
            stored.task.updated = now;
            reservation.claimed.push(stored.task.clone());
        }

        for task in &reservation.claimed {
            state.record_event(task.id, agent, event::CLAIMED.to_string());
        }

        reservation.claimed.sort_by_key(|t| (t.created, t.id));
        Ok(reservation)
    }

    async fn find(&self, pipeline: &Pipeline, job_descriptor: &str) -> StoreResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state
            .tasks
            .values()
            .find(|t| t.pipeline_id == pipeline.id && t.task.job_descriptor == job_descriptor)
            .map(|t| t.task.clone()))
    }

    async fn find_by_id(&self, task_id: i64) -> StoreResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&task_id).map(|t| t.task.clone()))
    }

    async fn update_status(
        &self,
        task_id: i64,
        status: &TaskStatus,
        agent: &AgentId,
    ) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        let Some(stored) = state.tasks.get_mut(&task_id) else {
            return Ok(None);
        };

        stored.task.status = status.clone();
        if stored.task.claimed_by.is_none() && !status.is_pending() {
            stored.task.claimed_by = Some(agent.clone());
        }
        stored.task.updated = Utc::now();
        let task = stored.task.clone();

        state.record_event(task_id, agent, event::status_change(status));

        Ok(Some(task))
    }

    async fn list(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;
        Ok(state
            .ordered_tasks()
            .into_iter()
            .filter(|t| filter.matches(&t.task))
            .map(|t| t.task.clone())
            .collect())
    }

    async fn events(&self, task_id: i64) -> StoreResult<Vec<TaskEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(name: &str, version: &str, make_current: bool) -> RegisterPipeline {
        RegisterPipeline {
            name: name.to_string(),
            version: version.to_string(),
            uri: Some(format!("https://example.org/{}.git", name)),
            make_current,
        }
    }

    fn new_task(descriptor: &str) -> NewTask {
        NewTask {
            job_descriptor: descriptor.to_string(),
            definition: serde_json::json!({"input": descriptor}),
            prefix: None,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_version() {
        let store = MemoryStore::new();
        store.register(&register_req("align", "1.0", true)).await.unwrap();

        let result = store.register(&register_req("align", "1.0", true)).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_current_pointer_follows_registration() {
        let store = MemoryStore::new();
        store.register(&register_req("align", "1.0", true)).await.unwrap();
        store.register(&register_req("align", "2.0", false)).await.unwrap();

        let current = store.find_current("align").await.unwrap().unwrap();
        assert_eq!(current.version, "1.0");

        assert!(store.set_current("align", "2.0").await.unwrap());
        let current = store.find_current("align").await.unwrap().unwrap();
        assert_eq!(current.version, "2.0");

        assert!(!store.set_current("align", "3.0").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_descriptor_is_scoped_to_pipeline() {
        let store = MemoryStore::new();
        let agent = AgentId::from("creator");
        let v1 = store.register(&register_req("align", "1.0", true)).await.unwrap();
        let v2 = store.register(&register_req("align", "2.0", true)).await.unwrap();

        store.insert(&v1, new_task("sampleA"), &agent).await.unwrap();
        store.insert(&v2, new_task("sampleA"), &agent).await.unwrap();

        let result = store.insert(&v1, new_task("sampleA"), &agent).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_select_eligible_is_oldest_first_and_read_only() {
        let store = MemoryStore::new();
        let agent = AgentId::from("creator");
        let pipeline = store.register(&register_req("align", "1.0", true)).await.unwrap();

        for descriptor in ["a", "b", "c"] {
            store.insert(&pipeline, new_task(descriptor), &agent).await.unwrap();
        }

        let first = store.select_eligible(&pipeline, 2).await.unwrap();
        let second = store.select_eligible(&pipeline, 2).await.unwrap();

        let descriptors: Vec<&str> = first.iter().map(|t| t.job_descriptor.as_str()).collect();
        assert_eq!(descriptors, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reserve_drops_candidates_claimed_meanwhile() {
        let store = MemoryStore::new();
        let creator = AgentId::from("creator");
        let pipeline = store.register(&register_req("align", "1.0", true)).await.unwrap();

        for descriptor in ["a", "b", "c"] {
            store.insert(&pipeline, new_task(descriptor), &creator).await.unwrap();
        }

        // Both agents computed the same candidate set before either reserved
        let candidates: Vec<i64> = store
            .select_eligible(&pipeline, 3)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();

        let first = store
            .reserve(&candidates[..2], &AgentId::from("agent-1"))
            .await
            .unwrap();
        let second = store
            .reserve(&candidates, &AgentId::from("agent-2"))
            .await
            .unwrap();

        assert_eq!(first.claimed.len(), 2);
        assert_eq!(first.lost, 0);
        assert_eq!(second.claimed.len(), 1);
        assert_eq!(second.lost, 2);
        assert_eq!(second.claimed[0].job_descriptor, "c");
        assert_eq!(
            second.claimed[0].claimed_by,
            Some(AgentId::from("agent-2"))
        );
    }

    #[tokio::test]
    async fn test_update_status_attributes_unclaimed_task() {
        let store = MemoryStore::new();
        let creator = AgentId::from("creator");
        let pipeline = store.register(&register_req("align", "1.0", true)).await.unwrap();
        let task = store.insert(&pipeline, new_task("a"), &creator).await.unwrap();

        let updated = store
            .update_status(task.id, &TaskStatus::parse("RUNNING").unwrap(), &creator)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status.as_str(), "RUNNING");
        assert_eq!(updated.claimed_by, Some(creator.clone()));
        assert!(store.select_eligible(&pipeline, 10).await.unwrap().is_empty());

        let events = store.events(task.id).await.unwrap();
        let changes: Vec<&str> = events.iter().map(|e| e.change.as_str()).collect();
        assert_eq!(changes, vec!["Created", "Task changed, new status RUNNING"]);
    }

    #[tokio::test]
    async fn test_update_status_of_missing_task() {
        let store = MemoryStore::new();
        let result = store
            .update_status(42, &TaskStatus::claimed(), &AgentId::from("agent"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
