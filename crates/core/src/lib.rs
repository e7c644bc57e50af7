// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! casare-core: value model, event bus, execution context, node contract and
//! registry, and workflow schema shared by the robot-side runner and the
//! orchestrator.

pub mod macros;

pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod id;
pub mod node;
pub mod nodes;
pub mod offline_queue;
pub mod ports;
pub mod repository;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use context::{ExecutionContext, ResourceScope};
pub use error::{CoreError, ErrorKind};
pub use event::{Event, EventKind};
pub use event_bus::{EventBus, SubscriptionHandle};
pub use id::{short, IdBuf};
pub use node::{
    ControlSignal, ExecutionResult, Node, NodeConstructor, NodeData, NodeKind, NodeRegistry,
    PropertyDef, PropertySchema, PropertyType, UnknownNodeType,
};
pub use nodes::register_builtin_nodes;
pub use ports::{ControlFlow, PortDecl, PortName, PortType};
pub use repository::{Robot, RobotRepository, Tenant, TenantRepository};
pub use workflow::{
    Connection, ConnectionError, SubflowPort, SubflowPorts, Workflow, WorkflowError,
    WorkflowMetadata,
};

crate::define_id! {
    /// Identifies a node within a single workflow.
    pub struct NodeId("nod-");
}

crate::define_id! {
    /// Identifies a robot agent connected to the orchestrator.
    pub struct RobotId("rbt-");
}

crate::define_id! {
    /// Identifies a tenant isolation boundary.
    pub struct TenantId("tnt-");
}

crate::define_id! {
    /// Identifies a stored workflow definition.
    pub struct WorkflowId("wfl-");
}

crate::define_id! {
    /// Identifies one robot session connection.
    pub struct SessionId("ses-");
}

/// A job identifier. Spec §3 mandates UUID v4, which does not fit the
/// 23-byte [`id::IdBuf`] used by [`define_id!`]-generated ids, so `JobId`
/// wraps [`uuid::Uuid`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_string(s: impl AsRef<str>) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s.as_ref())?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An 8-character random checkpoint identifier (spec §3: not a prefixed id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub String);

impl CheckpointId {
    pub fn new() -> Self {
        Self(nanoid::nanoid!(8))
    }
}

impl Default for CheckpointId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
