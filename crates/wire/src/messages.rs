// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Message shapes for the orchestrator <-> robot session protocol
//! (spec §6.1). Every message carries `{type, ts, ...}`; an unknown `type`
//! deserializes to the `Unknown` catch-all variant rather than erroring
//! the connection (spec: "Any unknown type is logged and ignored").

use casare_core::{JobId, RobotId, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterCapabilities {
    pub types: Vec<String>,
    pub max_concurrent_jobs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub current_job_count: u32,
}

/// Messages a robot sends to the orchestrator (spec §6.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotMessage {
    Register {
        ts: u64,
        robot_id: RobotId,
        robot_name: String,
        hostname: String,
        environment: String,
        #[serde(default)]
        tenant_id: Option<TenantId>,
        capabilities: RegisterCapabilities,
    },
    Heartbeat {
        ts: u64,
        metrics: Metrics,
    },
    JobAccept {
        ts: u64,
        job_id: JobId,
    },
    JobReject {
        ts: u64,
        job_id: JobId,
        reason: String,
    },
    JobComplete {
        ts: u64,
        job_id: JobId,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
    },
    Log {
        ts: u64,
        #[serde(default)]
        job_id: Option<JobId>,
        level: String,
        message: String,
    },
    /// Catch-all for any `type` this version doesn't recognize. Logged and
    /// ignored by the orchestrator, never a protocol error.
    #[serde(other)]
    Unknown,
}

impl RobotMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            RobotMessage::Register { .. } => "register",
            RobotMessage::Heartbeat { .. } => "heartbeat",
            RobotMessage::JobAccept { .. } => "job_accept",
            RobotMessage::JobReject { .. } => "job_reject",
            RobotMessage::JobComplete { .. } => "job_complete",
            RobotMessage::Log { .. } => "log",
            RobotMessage::Unknown => "unknown",
        }
    }
}

/// Messages the orchestrator sends to a robot (spec §6.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        ts: u64,
        server_version: String,
        session_id: String,
    },
    JobAssign {
        ts: u64,
        job_id: JobId,
        workflow_id: WorkflowId,
        workflow_data: Value,
        variables: Value,
        timeout_ms: u64,
    },
    JobCancel {
        ts: u64,
        job_id: JobId,
    },
    Shutdown {
        ts: u64,
        reason: String,
    },
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::Welcome { .. } => "welcome",
            ServerMessage::JobAssign { .. } => "job_assign",
            ServerMessage::JobCancel { .. } => "job_cancel",
            ServerMessage::Shutdown { .. } => "shutdown",
            ServerMessage::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
