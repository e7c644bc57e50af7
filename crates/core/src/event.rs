// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Event kinds and payload (spec §4.1).

use crate::{JobId, NodeId, RobotId};
use serde::{Deserialize, Serialize};

/// Every event kind the runner and orchestrator emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WorkflowStarted,
    WorkflowPaused,
    WorkflowResumed,
    WorkflowStopped,
    WorkflowCompleted,
    WorkflowFailed,
    NodeStarted,
    NodeCompleted,
    NodeError,
    RobotRegistered,
    RobotDisconnected,
    RobotHeartbeat,
    JobSubmitted,
    JobAssigned,
    JobRequeued,
    JobCompleted,
}

crate::simple_display! {
    EventKind {
        WorkflowStarted => "workflow:started",
        WorkflowPaused => "workflow:paused",
        WorkflowResumed => "workflow:resumed",
        WorkflowStopped => "workflow:stopped",
        WorkflowCompleted => "workflow:completed",
        WorkflowFailed => "workflow:failed",
        NodeStarted => "node:started",
        NodeCompleted => "node:completed",
        NodeError => "node:error",
        RobotRegistered => "robot:registered",
        RobotDisconnected => "robot:disconnected",
        RobotHeartbeat => "robot:heartbeat",
        JobSubmitted => "job:submitted",
        JobAssigned => "job:assigned",
        JobRequeued => "job:requeued",
        JobCompleted => "job:completed",
    }
}

/// Optional context carried alongside an [`EventKind`]. Not every event kind
/// uses every field; unused fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub node_id: Option<NodeId>,
    pub job_id: Option<JobId>,
    pub robot_id: Option<RobotId>,
    pub message: Option<String>,
    /// Arbitrary additional payload (e.g. job metrics, error detail).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A published event: kind, payload, and the epoch-millisecond timestamp it
/// was created at (callers pass this in so the event bus itself stays
/// deterministic and testable, per [`crate::clock::Clock`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub data: EventData,
    pub timestamp_ms: u64,
}

impl Event {
    pub fn new(kind: EventKind, timestamp_ms: u64) -> Self {
        Self { kind, data: EventData::default(), timestamp_ms }
    }

    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.data.node_id = Some(node_id);
        self
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.data.job_id = Some(job_id);
        self
    }

    pub fn with_robot(mut self, robot_id: RobotId) -> Self {
        self.data.robot_id = Some(robot_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.data.message = Some(message.into());
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
