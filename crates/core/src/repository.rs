// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Robot and tenant domain types and repository contracts (spec §4.6, §4.7).

use crate::{RobotId, SessionId, TenantId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Offline,
    Idle,
    Busy,
    Draining,
}

/// A registered robot agent (spec §4.6): one robot belongs to exactly one
/// tenant, and every assignment decision respects that boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
    pub robot_id: RobotId,
    pub tenant_id: TenantId,
    pub name: String,
    pub status: RobotStatus,
    pub max_concurrent_jobs: u32,
    pub current_job_count: u32,
    pub session_id: Option<SessionId>,
    pub last_heartbeat_ms: u64,
    pub tags: Vec<String>,
}

impl Robot {
    pub fn has_capacity(&self) -> bool {
        matches!(self.status, RobotStatus::Idle | RobotStatus::Busy) && self.current_job_count < self.max_concurrent_jobs
    }

    pub fn is_connected(&self) -> bool {
        self.session_id.is_some() && !matches!(self.status, RobotStatus::Offline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub max_robots: u32,
    pub enabled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("robot {0} not found")]
    RobotNotFound(RobotId),
    #[error("tenant {0} not found")]
    TenantNotFound(TenantId),
    #[error("tenant {0} already has a robot named {1}")]
    DuplicateRobotName(TenantId, String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl crate::error::Classify for RepositoryError {
    fn kind(&self) -> crate::error::ErrorKind {
        match self {
            RepositoryError::RobotNotFound(_) | RepositoryError::TenantNotFound(_) => crate::error::ErrorKind::NotFound,
            RepositoryError::DuplicateRobotName(_, _) => crate::error::ErrorKind::Conflict,
            RepositoryError::Storage(_) => crate::error::ErrorKind::Transient,
        }
    }
}

/// Persistence boundary for robot records (spec §4.6, §4.10's tenant
/// isolation invariant: every method that takes a `tenant_id` must never
/// return or mutate a robot belonging to a different tenant).
#[async_trait]
pub trait RobotRepository: Send + Sync {
    async fn upsert(&self, robot: Robot) -> Result<(), RepositoryError>;
    async fn get(&self, tenant_id: TenantId, robot_id: RobotId) -> Result<Robot, RepositoryError>;
    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Robot>, RepositoryError>;
    async fn remove(&self, tenant_id: TenantId, robot_id: RobotId) -> Result<(), RepositoryError>;
}

/// Persistence boundary for tenant records (spec §4.7).
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn upsert(&self, tenant: Tenant) -> Result<(), RepositoryError>;
    async fn get(&self, tenant_id: TenantId) -> Result<Tenant, RepositoryError>;
    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError>;
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
