// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Workflow graph: nodes, typed connections, save/load, validation
//! (spec §3, §4.5, §6.2).

use crate::node::{NodeData, NodeRegistry};
use crate::ports::PortName;
use crate::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One edge: `(source_node, source_port, target_node, target_port)` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source_node: NodeId,
    pub source_port: PortName,
    pub target_node: NodeId,
    pub target_port: PortName,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConnectionError {
    #[error("source node {0} not found")]
    SourceNodeNotFound(NodeId),
    #[error("target node {0} not found")]
    TargetNodeNotFound(NodeId),
    #[error("source port {1} not found on node {0}")]
    SourcePortNotFound(NodeId, String),
    #[error("target port {1} not found on node {0}")]
    TargetPortNotFound(NodeId, String),
    #[error("source {0}.{1} is not an output port")]
    SourceNotOutput(NodeId, String),
    #[error("target {0}.{1} is not an input port")]
    TargetNotInput(NodeId, String),
    #[error("cannot connect a control port to a data port")]
    MixedControlAndData,
    #[error("incompatible port types: source is {0}, target accepts {1}")]
    IncompatibleTypes(String, String),
    #[error("data input {0}.{1} already has a connection")]
    DuplicateDataTarget(NodeId, String),
}

impl crate::error::Classify for ConnectionError {
    fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Validation
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("connection invalid: {0}")]
    Connection(#[from] ConnectionError),
    #[error("unknown node type: {0}")]
    UnknownNodeType(#[from] crate::node::UnknownNodeType),
    #[error("more than one candidate start node and none nominated")]
    AmbiguousStart,
    #[error("no start node found")]
    NoStartNode,
    #[error("duplicate port name {0} within node {1}")]
    DuplicatePortName(String, NodeId),
    #[error("config key set does not match property schema for node {0}")]
    ConfigSchemaMismatch(NodeId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl crate::error::Classify for WorkflowError {
    fn kind(&self) -> crate::error::ErrorKind {
        match self {
            WorkflowError::Io(_) => crate::error::ErrorKind::Transient,
            _ => crate::error::ErrorKind::Validation,
        }
    }
}

/// Extra port declarations for a subflow file (spec §6.2): the ports the
/// subflow exposes to its parent, mapped to an internal node/port, plus an
/// editor sizing hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubflowPort {
    pub name: String,
    pub data_type: crate::ports::PortType,
    pub internal_node_id: NodeId,
    pub internal_port_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubflowPorts {
    #[serde(default)]
    pub inputs: Vec<SubflowPort>,
    #[serde(default)]
    pub outputs: Vec<SubflowPort>,
}

#[derive(Debug, Clone, Default, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

const SCHEMA_VERSION: u32 = 1;

/// The graph of nodes and typed connections (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub metadata: WorkflowMetadata,
    pub nodes: IndexMap<NodeId, NodeData>,
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<SubflowPorts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl PartialEq for Workflow {
    fn eq(&self, other: &Self) -> bool {
        // Canonical form: the JSON two workflows serialize to, since
        // `IndexMap`/`Vec` preserve insertion order and `save_to_file`
        // always writes in that order.
        serde_json::to_string(self).ok() == serde_json::to_string(other).ok()
    }
}

impl Workflow {
    pub fn new(metadata: WorkflowMetadata) -> Self {
        Self { schema_version: SCHEMA_VERSION, metadata, nodes: IndexMap::new(), connections: Vec::new(), ports: None, bounds: None }
    }

    pub fn add_node(&mut self, data: NodeData) {
        self.nodes.insert(data.node_id, data);
    }

    /// Validate and add a connection (spec §3). Rejects duplicate data
    /// targets at connect time rather than allowing ambiguous last-writer
    /// semantics (spec §9 Open Question).
    pub fn add_connection(&mut self, registry: &NodeRegistry, conn: Connection) -> Result<(), ConnectionError> {
        self.validate_connection(registry, &conn)?;
        self.connections.push(conn);
        Ok(())
    }

    fn validate_connection(&self, registry: &NodeRegistry, conn: &Connection) -> Result<(), ConnectionError> {
        let source_data =
            self.nodes.get(&conn.source_node).ok_or(ConnectionError::SourceNodeNotFound(conn.source_node))?;
        let target_data =
            self.nodes.get(&conn.target_node).ok_or(ConnectionError::TargetNodeNotFound(conn.target_node))?;

        let source_node = registry
            .load_node(source_data)
            .map_err(|_| ConnectionError::SourceNodeNotFound(conn.source_node))?;
        let target_node = registry
            .load_node(target_data)
            .map_err(|_| ConnectionError::TargetNodeNotFound(conn.target_node))?;

        let source_port = source_node
            .output_ports()
            .into_iter()
            .find(|p| p.name == conn.source_port)
            .ok_or_else(|| ConnectionError::SourcePortNotFound(conn.source_node, conn.source_port.to_string()))?;

        let target_port = target_node
            .input_ports()
            .into_iter()
            .find(|p| p.name == conn.target_port)
            .ok_or_else(|| ConnectionError::TargetPortNotFound(conn.target_node, conn.target_port.to_string()))?;

        match (&source_port.flow, &target_port.flow) {
            (crate::ports::ControlFlow::Control, crate::ports::ControlFlow::Control) => {}
            (crate::ports::ControlFlow::Data(src_ty), crate::ports::ControlFlow::Data(dst_ty)) => {
                if !dst_ty.accepts(*src_ty) {
                    return Err(ConnectionError::IncompatibleTypes(src_ty.to_string(), dst_ty.to_string()));
                }
                let duplicate = self
                    .connections
                    .iter()
                    .any(|c| c.target_node == conn.target_node && c.target_port == conn.target_port);
                if duplicate {
                    return Err(ConnectionError::DuplicateDataTarget(conn.target_node, conn.target_port.to_string()));
                }
            }
            _ => return Err(ConnectionError::MixedControlAndData),
        }

        Ok(())
    }

    /// The node flagged `is_start_node`, or the single node with no
    /// `exec_in` predecessors. Ties fail with [`WorkflowError::AmbiguousStart`].
    pub fn find_start_node(&self) -> Result<NodeId, WorkflowError> {
        let flagged: Vec<NodeId> = self.nodes.values().filter(|n| n.is_start_node).map(|n| n.node_id).collect();
        if flagged.len() == 1 {
            return Ok(flagged[0]);
        }
        if flagged.len() > 1 {
            return Err(WorkflowError::AmbiguousStart);
        }

        let has_control_in: HashSet<NodeId> = self
            .connections
            .iter()
            .filter(|c| c.target_port.as_str() == crate::ports::EXEC_IN)
            .map(|c| c.target_node)
            .collect();
        let candidates: Vec<NodeId> = self.nodes.keys().copied().filter(|id| !has_control_in.contains(id)).collect();

        match candidates.len() {
            0 => Err(WorkflowError::NoStartNode),
            1 => Ok(candidates[0]),
            _ => Err(WorkflowError::AmbiguousStart),
        }
    }

    /// Weak connectivity from the start node: every node is reachable
    /// ignoring edge direction.
    pub fn is_runnable(&self) -> bool {
        let Ok(start) = self.find_start_node() else { return false };
        if self.nodes.is_empty() {
            return false;
        }

        let mut adjacency: std::collections::HashMap<NodeId, Vec<NodeId>> = std::collections::HashMap::new();
        for conn in &self.connections {
            adjacency.entry(conn.source_node).or_default().push(conn.target_node);
            adjacency.entry(conn.target_node).or_default().push(conn.source_node);
        }

        let mut visited = HashSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(node) = queue.pop_front() {
            for &neighbor in adjacency.get(&node).into_iter().flatten() {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        visited.len() == self.nodes.len()
    }

    /// Writes UTF-8 JSON with stable key order (the `IndexMap`/`Vec`
    /// insertion order, i.e. the order nodes/connections were added).
    pub fn save_to_file(&self, path: &Path) -> Result<(), WorkflowError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validates schema version, every node type against `registry`, and
    /// every connection invariant. Returns no partial state on any failure:
    /// the deserialized value is fully validated before being returned.
    pub fn load_from_file(path: &Path, registry: &NodeRegistry) -> Result<Self, WorkflowError> {
        let contents = std::fs::read_to_string(path)?;
        let workflow: Workflow = serde_json::from_str(&contents)?;
        workflow.validate(registry)?;
        Ok(workflow)
    }

    fn validate(&self, registry: &NodeRegistry) -> Result<(), WorkflowError> {
        for data in self.nodes.values() {
            if !registry.is_registered(&data.node_type) {
                return Err(crate::node::UnknownNodeType(data.node_type.clone()).into());
            }
            let node = registry.load_node(data)?;

            let mut seen_inputs = HashSet::new();
            for p in node.input_ports() {
                if !seen_inputs.insert(p.name.clone()) {
                    return Err(WorkflowError::DuplicatePortName(p.name.to_string(), data.node_id));
                }
            }
            let mut seen_outputs = HashSet::new();
            for p in node.output_ports() {
                if !seen_outputs.insert(p.name.clone()) {
                    return Err(WorkflowError::DuplicatePortName(p.name.to_string(), data.node_id));
                }
            }

            if !data.is_start_node && !node.input_ports().iter().any(|p| p.name.as_str() == crate::ports::EXEC_IN) {
                // Non-start nodes must declare exec_in (spec §3 invariant).
                return Err(WorkflowError::DuplicatePortName("<missing exec_in>".into(), data.node_id));
            }

            let schema = node.property_schema();
            if !schema.0.is_empty() {
                let expected = schema.key_set();
                let actual: HashSet<&str> = data.config.keys().map(|s| s.as_str()).collect();
                if !actual.is_subset(&expected) {
                    return Err(WorkflowError::ConfigSchemaMismatch(data.node_id));
                }
            }
        }

        for conn in &self.connections {
            self.validate_connection(registry, conn)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
