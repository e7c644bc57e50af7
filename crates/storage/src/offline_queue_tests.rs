// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use std::collections::HashMap;
use tempfile::tempdir;

fn job(id: JobId) -> QueuedJob {
    QueuedJob { job_id: id, workflow_json: "{}".into(), last_checkpoint: None, enqueued_at_ms: 1 }
}

fn checkpoint(job_id: JobId) -> CheckpointState {
    CheckpointState {
        checkpoint_id: CheckpointId::new(),
        job_id,
        workflow_name: "test".into(),
        current_node_id: Some("start".into()),
        executed_nodes: vec!["start".into()],
        execution_path: vec!["start".into()],
        variables: HashMap::new(),
        scope_state: HashMap::new(),
        errors: Vec::new(),
        created_at_ms: 1,
        browser_state: Default::default(),
    }
}

#[tokio::test]
async fn enqueue_then_dequeue_returns_the_oldest_job() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();

    let a = JobId::new();
    let b = JobId::new();
    queue.enqueue_job(job(a)).await.unwrap();
    queue.enqueue_job(job(b)).await.unwrap();

    let dequeued = queue.dequeue_job().await.unwrap().unwrap();
    assert_eq!(dequeued.job_id, a);
}

#[tokio::test]
async fn remove_job_takes_it_out_of_pending_jobs() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let id = JobId::new();
    queue.enqueue_job(job(id)).await.unwrap();
    queue.remove_job(id).await.unwrap();

    assert!(queue.pending_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn save_and_load_checkpoint_roundtrips() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let state = checkpoint(JobId::new());
    queue.save_checkpoint(state.clone()).await.unwrap();

    let loaded = queue.load_checkpoint(&state.checkpoint_id).await.unwrap();
    assert_eq!(loaded.job_id, state.job_id);
}

#[tokio::test]
async fn load_checkpoint_returns_not_found_for_unknown_id() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let err = queue.load_checkpoint(&CheckpointId::new()).await.unwrap_err();
    assert!(matches!(err, OfflineQueueError::CheckpointNotFound(_)));
}

#[tokio::test]
async fn latest_checkpoint_for_job_tracks_the_most_recent_save() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let job_id = JobId::new();
    let mut first = checkpoint(job_id);
    first.created_at_ms = 1;
    let mut second = checkpoint(job_id);
    second.created_at_ms = 2;

    queue.save_checkpoint(first).await.unwrap();
    queue.save_checkpoint(second.clone()).await.unwrap();

    let latest = queue.latest_checkpoint_for_job(job_id).await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, second.checkpoint_id);
}

#[tokio::test]
async fn clear_checkpoints_for_job_removes_all_its_checkpoints() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let job_id = JobId::new();
    let state = checkpoint(job_id);
    queue.save_checkpoint(state.clone()).await.unwrap();
    queue.clear_checkpoints_for_job(job_id).await.unwrap();

    let err = queue.load_checkpoint(&state.checkpoint_id).await.unwrap_err();
    assert!(matches!(err, OfflineQueueError::CheckpointNotFound(_)));
    assert!(queue.latest_checkpoint_for_job(job_id).await.unwrap().is_none());
}

#[tokio::test]
async fn reopening_the_queue_restores_pending_jobs_and_checkpoints() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q.wal");
    let job_id = JobId::new();
    let state = checkpoint(job_id);
    {
        let queue = FileOfflineQueue::open(&path).unwrap();
        queue.enqueue_job(job(job_id)).await.unwrap();
        queue.save_checkpoint(state.clone()).await.unwrap();
    }

    let queue = FileOfflineQueue::open(&path).unwrap();
    assert_eq!(queue.pending_jobs().await.unwrap().len(), 1);
    assert!(queue.load_checkpoint(&state.checkpoint_id).await.is_ok());
}

#[tokio::test]
async fn compacting_then_reopening_still_sees_all_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q.wal");
    let job_id = JobId::new();
    let state = checkpoint(job_id);
    {
        let queue = FileOfflineQueue::open(&path).unwrap();
        queue.enqueue_job(job(job_id)).await.unwrap();
        queue.save_checkpoint(state.clone()).await.unwrap();
        queue.compact().unwrap();
    }

    let queue = FileOfflineQueue::open(&path).unwrap();
    assert_eq!(queue.pending_jobs().await.unwrap().len(), 1);
    assert!(queue.load_checkpoint(&state.checkpoint_id).await.is_ok());
}

#[tokio::test]
async fn records_written_after_compaction_still_replay_on_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q.wal");
    let first = JobId::new();
    let second = JobId::new();
    {
        let queue = FileOfflineQueue::open(&path).unwrap();
        queue.enqueue_job(job(first)).await.unwrap();
        queue.compact().unwrap();
        queue.enqueue_job(job(second)).await.unwrap();
    }

    let queue = FileOfflineQueue::open(&path).unwrap();
    let pending = queue.pending_jobs().await.unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn enqueueing_the_same_job_id_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let queue = FileOfflineQueue::open(dir.path().join("q.wal")).unwrap();
    let id = JobId::new();
    queue.enqueue_job(job(id)).await.unwrap();
    queue.enqueue_job(job(id)).await.unwrap();

    assert_eq!(queue.pending_jobs().await.unwrap().len(), 1);
}
