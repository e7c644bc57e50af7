// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! The offline queue contract (spec §4.8): durable job/checkpoint persistence
//! on the robot side, so a robot can resume work after a crash or a lost
//! connection to the orchestrator without replaying completed steps.
//!
//! Defined here rather than in `casare-storage` so both `casare-runner`
//! (the consumer) and `casare-storage` (the concrete implementation) depend
//! on `casare-core` without depending on each other.

use crate::{CheckpointId, JobId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A durable snapshot of one job's in-flight execution state (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    pub checkpoint_id: CheckpointId,
    pub job_id: JobId,
    pub workflow_name: String,
    /// The last node that finished executing before this checkpoint was
    /// taken; resume continues from its successor(s) (spec §4.6).
    #[serde(default)]
    pub current_node_id: Option<String>,
    /// Every node id visited so far, deduplicated; resume skips these
    /// rather than re-running completed work.
    #[serde(default)]
    pub executed_nodes: Vec<String>,
    pub execution_path: Vec<String>,
    pub variables: HashMap<String, Value>,
    pub scope_state: HashMap<String, Value>,
    #[serde(default)]
    pub errors: Vec<(String, String)>,
    pub created_at_ms: u64,
    /// Browser-session presence (spec §4.7): concrete browser automation
    /// nodes are out of scope, so this only captures the convention-based
    /// `__browser_*` context variables a future browser node would set.
    #[serde(default)]
    pub browser_state: BrowserState,
}

/// Browser-session presence captured at checkpoint time (spec §4.7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserState {
    pub present: bool,
    #[serde(default)]
    pub active_page_name: Option<String>,
    #[serde(default)]
    pub page_count: u32,
}

/// A job queued for execution but not yet picked up, or one that was
/// interrupted and needs to resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: JobId,
    pub workflow_json: String,
    pub last_checkpoint: Option<CheckpointId>,
    pub enqueued_at_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum OfflineQueueError {
    #[error("checkpoint {0} not found")]
    CheckpointNotFound(CheckpointId),
    #[error("job {0} not found in the offline queue")]
    JobNotFound(JobId),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl crate::error::Classify for OfflineQueueError {
    fn kind(&self) -> crate::error::ErrorKind {
        match self {
            OfflineQueueError::CheckpointNotFound(_) | OfflineQueueError::JobNotFound(_) => {
                crate::error::ErrorKind::NotFound
            }
            OfflineQueueError::Io(_) | OfflineQueueError::Serialization(_) => crate::error::ErrorKind::Transient,
        }
    }
}

/// Durable persistence a runner uses to survive a restart mid-job
/// (spec §4.8). Implemented concretely by `casare-storage`'s
/// write-ahead-log-backed queue; a runner only ever sees this trait object.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    async fn enqueue_job(&self, job: QueuedJob) -> Result<(), OfflineQueueError>;
    async fn dequeue_job(&self) -> Result<Option<QueuedJob>, OfflineQueueError>;
    async fn remove_job(&self, job_id: JobId) -> Result<(), OfflineQueueError>;

    async fn save_checkpoint(&self, state: CheckpointState) -> Result<(), OfflineQueueError>;
    async fn load_checkpoint(&self, id: &CheckpointId) -> Result<CheckpointState, OfflineQueueError>;
    async fn latest_checkpoint_for_job(&self, job_id: JobId) -> Result<Option<CheckpointState>, OfflineQueueError>;
    async fn clear_checkpoints_for_job(&self, job_id: JobId) -> Result<(), OfflineQueueError>;

    /// Every job still queued or mid-flight, oldest first. Used at startup
    /// to rehydrate work after a crash.
    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, OfflineQueueError>;
}
