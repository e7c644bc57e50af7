// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Thin operator-CLI <-> orchestrator protocol: submit a job, list robots,
//! inspect the audit log (spec §6.5's CLI scope). Shares the same
//! length-prefixed JSON framing as the robot session protocol
//! ([`crate::read_message`]/[`crate::write_message`]) rather than a second
//! wire format.

use casare_core::{JobId, RobotId, TenantId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitJobRequest {
    pub workflow_id: WorkflowId,
    pub workflow_data: Value,
    #[serde(default)]
    pub variables: Value,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub target_robot_id: Option<RobotId>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

fn default_priority() -> u8 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotSummary {
    pub robot_id: RobotId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: String,
    pub current_job_count: u32,
    pub max_concurrent_jobs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditQueryRequest {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default)]
    pub robot_id: Option<RobotId>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// A request an operator CLI sends to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminRequest {
    SubmitJob(SubmitJobRequest),
    ListRobots,
    QueryAudit(AuditQueryRequest),
}

/// The orchestrator's reply to an [`AdminRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminResponse {
    JobSubmitted { job_id: JobId, status: String },
    Robots { robots: Vec<RobotSummary> },
    AuditEvents { events: Vec<Value> },
    Error { message: String },
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
