// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Job model (spec §3 "Job (orchestrator side)"): lives here rather than in
//! `casare-core` since a job only ever exists on the orchestrator side — a
//! robot receives a `job_assign` wire message, not this type.

use casare_core::{JobId, RobotId, TenantId, WorkflowId};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
    Cancelled,
}

/// What a caller submits to create a job (spec §4.9 `submit_job(spec)`).
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub workflow_id: WorkflowId,
    pub workflow_data: Value,
    pub variables: Value,
    pub priority: u8,
    pub target_robot_id: Option<RobotId>,
    pub required_capabilities: Vec<String>,
    pub timeout_ms: u64,
    pub tenant_id: Option<TenantId>,
}

/// An orchestrator-side job record (spec §3). `tenant_id: None` means the
/// job may be assigned to a robot of any tenant.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: JobId,
    pub workflow_id: WorkflowId,
    pub workflow_data: Value,
    pub variables: Value,
    pub priority: u8,
    pub target_robot_id: Option<RobotId>,
    pub required_capabilities: Vec<String>,
    pub timeout_ms: u64,
    pub tenant_id: Option<TenantId>,
    pub status: JobStatus,
    pub assigned_robot_id: Option<RobotId>,
    pub rejected_by: HashSet<RobotId>,
    pub created_at_ms: u64,
}

impl Job {
    pub fn new(job_id: JobId, spec: JobSpec, created_at_ms: u64) -> Self {
        Self {
            job_id,
            workflow_id: spec.workflow_id,
            workflow_data: spec.workflow_data,
            variables: spec.variables,
            priority: spec.priority,
            target_robot_id: spec.target_robot_id,
            required_capabilities: spec.required_capabilities,
            timeout_ms: spec.timeout_ms,
            tenant_id: spec.tenant_id,
            status: JobStatus::Pending,
            assigned_robot_id: None,
            rejected_by: HashSet::new(),
            created_at_ms,
        }
    }

    /// Whether `tenant_id` is an acceptable target for this job (spec §4.9
    /// tenant isolation invariant): a tenant-agnostic job (`None`) may go to
    /// any robot; a tenant-scoped job only to a robot of the same tenant.
    pub fn accepts_tenant(&self, tenant_id: TenantId) -> bool {
        match self.tenant_id {
            None => true,
            Some(t) => t == tenant_id,
        }
    }
}
