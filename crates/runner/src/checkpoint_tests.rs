// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use async_trait::async_trait;
use casare_core::offline_queue::{OfflineQueueError, QueuedJob};
use casare_core::FakeClock;
use parking_lot::Mutex as PLMutex;
use serde_json::json;

#[derive(Default)]
struct MemQueue {
    checkpoints: PLMutex<Vec<CheckpointState>>,
}

#[async_trait]
impl OfflineQueue for MemQueue {
    async fn enqueue_job(&self, _job: QueuedJob) -> Result<(), OfflineQueueError> {
        Ok(())
    }

    async fn dequeue_job(&self) -> Result<Option<QueuedJob>, OfflineQueueError> {
        Ok(None)
    }

    async fn remove_job(&self, _job_id: JobId) -> Result<(), OfflineQueueError> {
        Ok(())
    }

    async fn save_checkpoint(&self, state: CheckpointState) -> Result<(), OfflineQueueError> {
        self.checkpoints.lock().push(state);
        Ok(())
    }

    async fn load_checkpoint(&self, id: &casare_core::CheckpointId) -> Result<CheckpointState, OfflineQueueError> {
        self.checkpoints
            .lock()
            .iter()
            .find(|c| &c.checkpoint_id == id)
            .cloned()
            .ok_or_else(|| OfflineQueueError::CheckpointNotFound(id.clone()))
    }

    async fn latest_checkpoint_for_job(&self, job_id: JobId) -> Result<Option<CheckpointState>, OfflineQueueError> {
        Ok(self.checkpoints.lock().iter().filter(|c| c.job_id == job_id).max_by_key(|c| c.created_at_ms).cloned())
    }

    async fn clear_checkpoints_for_job(&self, job_id: JobId) -> Result<(), OfflineQueueError> {
        self.checkpoints.lock().retain(|c| c.job_id != job_id);
        Ok(())
    }

    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, OfflineQueueError> {
        Ok(vec![])
    }
}

fn context_with(variables: &[(&str, Value)]) -> ExecutionContext {
    let mut ctx = ExecutionContext::new("checkpoint-test");
    for (k, v) in variables {
        ctx.set(*k, v.clone());
    }
    ctx
}

#[tokio::test]
async fn save_checkpoint_captures_variables_execution_path_and_timestamp() {
    let queue = Arc::new(MemQueue::default());
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    let manager = CheckpointManager::with_clock(queue.clone(), clock);
    let job_id = JobId::new();

    let mut ctx = context_with(&[("x", json!(1))]);
    let node_a = NodeId::new();
    ctx.record_visit(node_a);

    let id = manager.save_checkpoint(job_id, &ctx, node_a).await.unwrap();
    let saved = queue.latest_checkpoint_for_job(job_id).await.unwrap().unwrap();

    assert_eq!(saved.checkpoint_id, id);
    assert_eq!(saved.workflow_name, "checkpoint-test");
    assert_eq!(saved.current_node_id, Some(node_a.to_string()));
    assert_eq!(saved.executed_nodes, vec![node_a.to_string()]);
    assert_eq!(saved.variables.get("x"), Some(&json!(1)));
    assert_eq!(saved.execution_path, vec![node_a.to_string()]);
    assert_eq!(saved.created_at_ms, 42);
}

#[tokio::test]
async fn maybe_save_is_a_no_op_when_auto_save_is_disabled() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue.clone()).with_auto_save(false);
    let job_id = JobId::new();
    let ctx = context_with(&[]);

    let saved = manager.maybe_save(job_id, &ctx, NodeId::new(), true).await.unwrap();
    assert!(saved.is_none());
    assert!(queue.latest_checkpoint_for_job(job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn maybe_save_always_fires_at_a_scope_barrier() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue.clone()).with_interval(0);
    let job_id = JobId::new();
    let mut ctx = context_with(&[]);
    let node_a = NodeId::new();
    ctx.record_visit(node_a);

    assert!(manager.maybe_save(job_id, &ctx, node_a, false).await.unwrap().is_none());
    assert!(manager.maybe_save(job_id, &ctx, node_a, true).await.unwrap().is_some());
}

#[tokio::test]
async fn maybe_save_fires_every_interval_nodes_visited() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue.clone()).with_interval(2);
    let job_id = JobId::new();
    let mut ctx = context_with(&[]);

    let node_a = NodeId::new();
    ctx.record_visit(node_a);
    assert!(manager.maybe_save(job_id, &ctx, node_a, false).await.unwrap().is_none());

    let node_b = NodeId::new();
    ctx.record_visit(node_b);
    assert!(manager.maybe_save(job_id, &ctx, node_b, false).await.unwrap().is_some());
}

#[tokio::test]
async fn restore_latest_rehydrates_variables_and_execution_path() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue);
    let job_id = JobId::new();

    let mut original = context_with(&[("y", json!("hello"))]);
    let node_a = NodeId::new();
    original.record_visit(node_a);
    manager.save_checkpoint(job_id, &original, node_a).await.unwrap();

    let mut restored = ExecutionContext::new("checkpoint-test");
    let resume = manager.restore_latest(job_id, &mut restored).await.unwrap();

    let resume = resume.unwrap();
    assert_eq!(resume.current_node_id, Some(node_a));
    assert!(resume.executed_nodes.contains(&node_a));
    assert_eq!(restored.get("y", None), json!("hello"));
    assert_eq!(restored.execution_path, vec![node_a]);
}

#[tokio::test]
async fn restore_latest_returns_none_for_a_job_with_no_checkpoint() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue);
    let mut ctx = ExecutionContext::new("checkpoint-test");

    let resume = manager.restore_latest(JobId::new(), &mut ctx).await.unwrap();
    assert!(resume.is_none());
}

#[tokio::test]
async fn clear_drops_every_checkpoint_for_a_job() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue);
    let job_id = JobId::new();
    let node_a = NodeId::new();
    manager.save_checkpoint(job_id, &context_with(&[]), node_a).await.unwrap();

    manager.clear(job_id).await.unwrap();
    let mut ctx = ExecutionContext::new("checkpoint-test");
    assert!(manager.restore_latest(job_id, &mut ctx).await.unwrap().is_none());
}

#[tokio::test]
async fn browser_state_is_captured_only_from_dunder_browser_variables() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue.clone());
    let job_id = JobId::new();
    let ctx = context_with(&[
        ("__browser_present", json!(true)),
        ("__browser_active_page_name", json!("checkout")),
        ("__browser_page_count", json!(3)),
        ("unrelated", json!(1)),
    ]);

    manager.save_checkpoint(job_id, &ctx, NodeId::new()).await.unwrap();
    let saved = queue.latest_checkpoint_for_job(job_id).await.unwrap().unwrap();

    assert!(saved.browser_state.present);
    assert_eq!(saved.browser_state.active_page_name.as_deref(), Some("checkout"));
    assert_eq!(saved.browser_state.page_count, 3);
}

#[tokio::test]
async fn record_error_appends_to_the_latest_checkpoints_failure_trail() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue.clone());
    let job_id = JobId::new();
    let node_a = NodeId::new();
    manager.save_checkpoint(job_id, &context_with(&[]), node_a).await.unwrap();

    manager.record_error(job_id, node_a, "boom").await.unwrap();

    let saved = queue.latest_checkpoint_for_job(job_id).await.unwrap().unwrap();
    assert_eq!(saved.errors, vec![(node_a.to_string(), "boom".to_string())]);
}

#[tokio::test]
async fn end_job_clears_checkpoints() {
    let queue = Arc::new(MemQueue::default());
    let manager = CheckpointManager::new(queue);
    let job_id = JobId::new();
    manager.save_checkpoint(job_id, &context_with(&[]), NodeId::new()).await.unwrap();

    manager.end_job(job_id).await.unwrap();

    let mut ctx = ExecutionContext::new("checkpoint-test");
    assert!(manager.restore_latest(job_id, &mut ctx).await.unwrap().is_none());
}
