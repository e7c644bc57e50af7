// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::{Event, EventKind};
use crate::node::{NodeData, Position};
use crate::repository::{Robot, RobotStatus, Tenant};
use crate::workflow::{Workflow, WorkflowMetadata};
use crate::{NodeId, RobotId, TenantId};
use serde_json::Map;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::event::EventKind;
    use crate::ports::PortType;
    use proptest::prelude::*;

    pub fn arb_event_kind() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::WorkflowStarted),
            Just(EventKind::WorkflowCompleted),
            Just(EventKind::WorkflowFailed),
            Just(EventKind::NodeStarted),
            Just(EventKind::NodeCompleted),
            Just(EventKind::NodeError),
            Just(EventKind::JobSubmitted),
            Just(EventKind::JobCompleted),
            Just(EventKind::JobRequeued),
            Just(EventKind::RobotRegistered),
            Just(EventKind::RobotDisconnected),
        ]
    }

    pub fn arb_port_type() -> impl Strategy<Value = PortType> {
        prop_oneof![
            Just(PortType::Any),
            Just(PortType::Boolean),
            Just(PortType::Integer),
            Just(PortType::Float),
            Just(PortType::String),
            Just(PortType::List),
            Just(PortType::Dict),
            Just(PortType::DateTime),
            Just(PortType::Bytes),
            Just(PortType::NodeReference),
        ]
    }
}

// ── Event factory functions ─────────────────────────────────────────────

pub fn workflow_started_event(job_id: crate::JobId) -> Event {
    Event::new(EventKind::WorkflowStarted, 1_000_000).with_job(job_id)
}

pub fn node_failed_event(node_id: NodeId, message: &str) -> Event {
    Event::new(EventKind::NodeError, 1_000_000).with_node(node_id).with_message(message)
}

pub fn robot_registered_event(robot_id: RobotId) -> Event {
    Event::new(EventKind::RobotRegistered, 1_000_000).with_robot(robot_id)
}

// ── Domain object builders ──────────────────────────────────────────────

pub fn sample_node_data(node_type: &str) -> NodeData {
    NodeData {
        node_id: NodeId::new(),
        node_type: node_type.to_string(),
        name: node_type.to_string(),
        position: Position::default(),
        config: Map::new(),
        is_start_node: false,
    }
}

pub fn sample_workflow() -> Workflow {
    Workflow::new(WorkflowMetadata {
        name: "sample".into(),
        description: String::new(),
        version: "0.1.0".into(),
        author: "test".into(),
        tags: vec![],
    })
}

pub fn sample_robot(tenant_id: TenantId) -> Robot {
    Robot {
        robot_id: RobotId::new(),
        tenant_id,
        name: "robot".into(),
        status: RobotStatus::Idle,
        max_concurrent_jobs: 1,
        current_job_count: 0,
        session_id: None,
        last_heartbeat_ms: 0,
        tags: vec![],
    }
}

pub fn sample_tenant() -> Tenant {
    Tenant { tenant_id: TenantId::new(), name: "tenant".into(), max_robots: 10, enabled: true }
}
