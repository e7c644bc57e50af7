// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! In-memory reference implementations of [`RobotRepository`]/
//! [`TenantRepository`] (C12/C13): concrete storage drivers are explicitly
//! out of scope (spec §1), so the orchestrator's default composition root
//! wires these up directly, matching the teacher's practice of shipping a
//! working in-memory store alongside the trait it satisfies.

use async_trait::async_trait;
use casare_core::repository::{Robot, RepositoryError, RobotRepository, Tenant, TenantRepository};
use casare_core::{RobotId, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryRobotRepository {
    robots: RwLock<HashMap<RobotId, Robot>>,
}

impl InMemoryRobotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RobotRepository for InMemoryRobotRepository {
    async fn upsert(&self, robot: Robot) -> Result<(), RepositoryError> {
        self.robots.write().insert(robot.robot_id, robot);
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId, robot_id: RobotId) -> Result<Robot, RepositoryError> {
        self.robots
            .read()
            .get(&robot_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .ok_or(RepositoryError::RobotNotFound(robot_id))
    }

    async fn list_for_tenant(&self, tenant_id: TenantId) -> Result<Vec<Robot>, RepositoryError> {
        Ok(self.robots.read().values().filter(|r| r.tenant_id == tenant_id).cloned().collect())
    }

    async fn remove(&self, tenant_id: TenantId, robot_id: RobotId) -> Result<(), RepositoryError> {
        let mut robots = self.robots.write();
        match robots.get(&robot_id) {
            Some(r) if r.tenant_id == tenant_id => {
                robots.remove(&robot_id);
                Ok(())
            }
            _ => Err(RepositoryError::RobotNotFound(robot_id)),
        }
    }
}

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn upsert(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        self.tenants.write().insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn get(&self, tenant_id: TenantId) -> Result<Tenant, RepositoryError> {
        self.tenants.read().get(&tenant_id).cloned().ok_or(RepositoryError::TenantNotFound(tenant_id))
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        Ok(self.tenants.read().values().cloned().collect())
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
