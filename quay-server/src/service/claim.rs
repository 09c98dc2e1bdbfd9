//! Claim Service
//!
//! Hands batches of pending tasks to agents.
//!
//! A claim resolves the pipeline reference, reads the oldest eligible
//! candidates, then reserves exactly those. The reservation re-checks every
//! candidate when it commits, so a task another agent claimed in between is
//! dropped from this batch instead of being handed out twice. A short or
//! empty batch is a normal outcome; nothing is retried here.

use quay_core::domain::agent::AgentId;
use quay_core::domain::pipeline::PipelineRef;
use quay_core::domain::task::Task;

use crate::repository::Store;
use crate::service::registry;
use crate::service::task::{Result, TaskError};

/// Tasks reserved by one claim call
#[derive(Debug, Clone, Default)]
pub struct ClaimOutcome {
    /// Claimed tasks, oldest first
    pub tasks: Vec<Task>,
    /// Batch size after clamping
    pub requested: usize,
    /// Candidates another claimant reserved first
    pub lost: usize,
}

impl ClaimOutcome {
    pub fn is_partial(&self) -> bool {
        self.lost > 0
    }
}

/// Claim up to `num_tasks` pending tasks of `reference` for `agent`
///
/// `num_tasks` above `max_claim` is clamped; zero or negative is rejected
/// before the store is touched.
pub async fn claim_tasks(
    store: &Store,
    agent: &AgentId,
    reference: &PipelineRef,
    num_tasks: i64,
    max_claim: usize,
) -> Result<ClaimOutcome> {
    let requested = validate_claim_count(num_tasks, max_claim)?;

    let pipeline = registry::resolve(store, reference).await?;

    let candidates = store.tasks.select_eligible(&pipeline, requested).await?;
    if candidates.is_empty() {
        tracing::debug!(
            "No pending tasks for {}@{} (agent {})",
            pipeline.name,
            pipeline.version,
            agent
        );
        return Ok(ClaimOutcome {
            requested,
            ..Default::default()
        });
    }

    let ids: Vec<i64> = candidates.iter().map(|t| t.id).collect();
    let reservation = store.tasks.reserve(&ids, agent).await?;

    let outcome = ClaimOutcome {
        tasks: reservation.claimed,
        requested,
        lost: reservation.lost,
    };

    if outcome.is_partial() {
        tracing::warn!(
            "Agent {} lost {} of {} candidate(s) on {}@{} to concurrent claims",
            agent,
            outcome.lost,
            ids.len(),
            pipeline.name,
            pipeline.version
        );
    }

    tracing::info!(
        "Agent {} claimed {} task(s) from {}@{} (requested {})",
        agent,
        outcome.tasks.len(),
        pipeline.name,
        pipeline.version,
        requested
    );

    Ok(outcome)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_claim_count(num_tasks: i64, max_claim: usize) -> Result<usize> {
    if num_tasks <= 0 {
        return Err(TaskError::InvalidInput(format!(
            "num_tasks must be a positive integer, got {}",
            num_tasks
        )));
    }

    let requested = usize::try_from(num_tasks).unwrap_or(usize::MAX);
    Ok(requested.min(max_claim.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use quay_core::dto::pipeline::RegisterPipeline;
    use quay_core::dto::task::CreateTask;

    use crate::service::task;

    async fn seeded_store(descriptors: &[&str]) -> Store {
        let store = Store::in_memory();
        for (version, current) in [("1.0", true), ("0.9", false)] {
            registry::register_pipeline(
                &store,
                RegisterPipeline {
                    name: "align".to_string(),
                    version: version.to_string(),
                    uri: Some("https://example.org/align.git".to_string()),
                    make_current: current,
                },
            )
            .await
            .unwrap();
        }

        let creator = AgentId::from("creator");
        for descriptor in descriptors {
            task::create_task(
                &store,
                &creator,
                CreateTask {
                    pipeline: PipelineRef::pinned("align", "1.0"),
                    job_descriptor: descriptor.to_string(),
                    definition: serde_json::json!({"sample": descriptor}),
                    status: None,
                    prefix: None,
                },
            )
            .await
            .unwrap();
        }
        store
    }

    #[test]
    fn test_validate_claim_count() {
        assert!(matches!(
            validate_claim_count(0, 100),
            Err(TaskError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_claim_count(-3, 100),
            Err(TaskError::InvalidInput(_))
        ));
        assert_eq!(validate_claim_count(5, 100).unwrap(), 5);
        assert_eq!(validate_claim_count(500, 100).unwrap(), 100);
    }

    #[tokio::test]
    async fn test_claim_rejects_non_positive_count_before_resolving() {
        let store = Store::in_memory();
        // Pipeline does not exist; validation must fail first
        let result = claim_tasks(
            &store,
            &AgentId::from("agent-1"),
            &PipelineRef::latest("missing"),
            0,
            100,
        )
        .await;
        assert!(matches!(result, Err(TaskError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_claim_scenario() {
        let store = seeded_store(&["sampleA"]).await;
        let agent = AgentId::from("agent-1");

        let outcome = claim_tasks(&store, &agent, &PipelineRef::latest("align"), 5, 100)
            .await
            .unwrap();

        assert_eq!(outcome.tasks.len(), 1);
        let task = &outcome.tasks[0];
        assert_eq!(task.job_descriptor, "sampleA");
        assert!(task.status.is_claimed());
        assert_eq!(task.claimed_by, Some(agent.clone()));
        assert_eq!(
            task.pipeline,
            PipelineRef::pinned("align", "1.0").with_uri("https://example.org/align.git")
        );

        let again = claim_tasks(&store, &agent, &PipelineRef::latest("align"), 5, 100)
            .await
            .unwrap();
        assert!(again.tasks.is_empty());
        assert!(!again.is_partial());
    }

    #[tokio::test]
    async fn test_claim_exhaustion() {
        let store = seeded_store(&["a", "b", "c"]).await;
        let agent = AgentId::from("agent-1");

        let outcome = claim_tasks(&store, &agent, &PipelineRef::latest("align"), 10, 100)
            .await
            .unwrap();
        let descriptors: Vec<&str> = outcome
            .tasks
            .iter()
            .map(|t| t.job_descriptor.as_str())
            .collect();
        assert_eq!(descriptors, vec!["a", "b", "c"]);
        assert_eq!(outcome.requested, 10);

        let next = claim_tasks(&store, &agent, &PipelineRef::latest("align"), 10, 100)
            .await
            .unwrap();
        assert!(next.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_claim_prefers_oldest_within_limit() {
        let store = seeded_store(&["a", "b", "c"]).await;

        let outcome = claim_tasks(
            &store,
            &AgentId::from("agent-1"),
            &PipelineRef::pinned("align", "1.0"),
            2,
            100,
        )
        .await
        .unwrap();

        let descriptors: Vec<&str> = outcome
            .tasks
            .iter()
            .map(|t| t.job_descriptor.as_str())
            .collect();
        assert_eq!(descriptors, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_claim_is_scoped_to_resolved_version() {
        let store = seeded_store(&["a"]).await;

        let outcome = claim_tasks(
            &store,
            &AgentId::from("agent-1"),
            &PipelineRef::pinned("align", "0.9"),
            5,
            100,
        )
        .await
        .unwrap();
        assert!(outcome.tasks.is_empty());

        let unknown = claim_tasks(
            &store,
            &AgentId::from("agent-1"),
            &PipelineRef::pinned("align", "4.2"),
            5,
            100,
        )
        .await;
        assert!(matches!(unknown, Err(TaskError::UnknownPipeline(_))));
    }

    #[tokio::test]
    async fn test_claim_clamps_to_max_claim() {
        let store = seeded_store(&["a", "b", "c"]).await;

        let outcome = claim_tasks(
            &store,
            &AgentId::from("agent-1"),
            &PipelineRef::latest("align"),
            50,
            2,
        )
        .await
        .unwrap();
        assert_eq!(outcome.requested, 2);
        assert_eq!(outcome.tasks.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_never_share_a_task() {
        let descriptors: Vec<String> = (0..40).map(|i| format!("sample{:02}", i)).collect();
        let refs: Vec<&str> = descriptors.iter().map(String::as_str).collect();
        let store = seeded_store(&refs).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let agent = AgentId::new(format!("agent-{}", i));
                let mut claimed = Vec::new();
                loop {
                    let outcome =
                        claim_tasks(&store, &agent, &PipelineRef::latest("align"), 3, 100)
                            .await
                            .unwrap();
                    if outcome.tasks.is_empty() && !outcome.is_partial() {
                        break;
                    }
                    claimed.extend(outcome.tasks.into_iter().map(|t| (t.id, agent.clone())));
                    tokio::task::yield_now().await;
                }
                claimed
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for (task_id, agent) in handle.await.unwrap() {
                assert!(seen.insert(task_id), "task {} claimed twice", task_id);
                let stored = store.tasks.find_by_id(task_id).await.unwrap().unwrap();
                assert_eq!(stored.claimed_by, Some(agent));
                total += 1;
            }
        }

        assert_eq!(total, 40);
    }
}
