// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Node contract and registry (spec §4.4).

use crate::context::ExecutionContext;
use crate::ports::{PortDecl, PortName};
use crate::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Tags the control-flow-relevant node variants so the runner can special
/// case scope nodes without downcasting every node (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    If,
    While,
    ForEach,
    Try,
    Retry,
    Throw,
    Assert,
    SubflowInvoke,
    Regular,
}

impl NodeKind {
    /// Scope nodes own per-run state keyed by their node id on the runner
    /// (spec's "Cyclic graphs -> scope-state map on the runner" redesign).
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::While | NodeKind::ForEach | NodeKind::Try | NodeKind::Retry | NodeKind::SubflowInvoke
        )
    }
}

/// The control-flow signal a node's execution may additionally report,
/// beyond which exec ports to fire next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    RetrySuccess,
    RetryFail,
    LoopContinue,
    LoopBreak,
}

/// The shape every node execution returns (spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Option<Map<String, Value>>,
    pub error: Option<String>,
    pub error_type: Option<String>,
    /// Names of exec output ports to fire. Empty/omitted for a leaf node;
    /// `None` on a successful plain node means the runner defaults to
    /// `["exec_out"]`.
    pub next_nodes: Option<Vec<String>>,
    pub control_flow: Option<ControlSignal>,
}

impl ExecutionResult {
    pub fn ok() -> Self {
        Self { success: true, ..Default::default() }
    }

    pub fn ok_with_ports(ports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { success: true, next_nodes: Some(ports.into_iter().map(Into::into).collect()), ..Default::default() }
    }

    pub fn failed(error_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), error_type: Some(error_type.into()), ..Default::default() }
    }

    /// The exec ports this result fires: the explicit `next_nodes`, or the
    /// plain-node default of `["exec_out"]` when omitted and successful.
    pub fn fired_ports(&self) -> Vec<String> {
        match &self.next_nodes {
            Some(ports) => ports.clone(),
            None if self.success => vec![crate::ports::EXEC_OUT.to_string()],
            None => Vec::new(),
        }
    }
}

/// Property schema entry (spec §4.4): name, type, default, label/tooltip,
/// required-ness, display order, and an optional `display_when` condition
/// that makes "super nodes" multiplex several actions behind one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyType {
    Boolean,
    Integer,
    Float,
    String,
    Choice,
    List,
    Dict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayWhen {
    pub property: String,
    pub equals: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
    pub default: Value,
    pub label: String,
    pub tooltip: String,
    pub required: bool,
    pub order: u32,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub display_when: Option<DisplayWhen>,
}

/// The full set of properties a node type accepts. Config key sets are
/// validated against this schema on save/load (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySchema(pub Vec<PropertyDef>);

impl PropertySchema {
    pub fn key_set(&self) -> std::collections::HashSet<&str> {
        self.0.iter().map(|p| p.name.as_str()).collect()
    }

    /// A property is visible given the current config values, honoring its
    /// `display_when` condition if present.
    pub fn is_visible(&self, property: &PropertyDef, config: &Map<String, Value>) -> bool {
        match &property.display_when {
            None => true,
            Some(cond) => config.get(&cond.property) == Some(&cond.equals),
        }
    }
}

/// The serializable shape of a node (spec §4.4): transient per-run state
/// (status, input/output values) is never serialized here; it only appears
/// inside checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub node_id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub config: Map<String, Value>,
    pub is_start_node: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Status of a node within one run. Transient; lives only on the live node
/// instance / inside a checkpoint, never in [`NodeData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
    Skipped,
    Paused,
}

/// The node contract (spec §4.4). Implementations are synchronous: a node
/// that needs async I/O spawns and blocks on its own task internally, since
/// the runner itself stays a single cooperative loop (DESIGN NOTES:
/// "async/await control flow -> explicit task model").
pub trait Node: Send + Sync {
    fn node_type(&self) -> &'static str;

    fn kind(&self) -> NodeKind {
        NodeKind::Regular
    }

    fn input_ports(&self) -> Vec<PortDecl>;
    fn output_ports(&self) -> Vec<PortDecl>;

    fn property_schema(&self) -> PropertySchema {
        PropertySchema::default()
    }

    /// Execute with the node's current config and the context's inputs
    /// already copied into `inputs`. `node_id` is this node's id within the
    /// workflow, passed in rather than stored on the instance since node
    /// instances are shared across concurrent runs (used by scope nodes to
    /// key into [`ExecutionContext::scope_state`]). Returns the result the
    /// runner uses to decide traversal.
    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        config: &Map<String, Value>,
        inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult;

    /// Node-declared timeout, or `None` to use the runner's default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    fn on_start(&self, _ctx: &mut ExecutionContext) {}
    fn on_complete(&self, _ctx: &mut ExecutionContext, _result: &ExecutionResult) {}
}

/// Constructs a live [`Node`] instance from its static config, used when a
/// [`Workflow`](crate::workflow::Workflow) is hydrated for execution.
pub type NodeConstructor = fn() -> Box<dyn Node>;

#[derive(Debug, thiserror::Error)]
#[error("unknown node type: {0}")]
pub struct UnknownNodeType(pub String);

impl crate::error::Classify for UnknownNodeType {
    fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Validation
    }
}

/// Maps node-type key to constructor. Populated by an explicit `register`
/// call at startup — no import-time side effects (DESIGN NOTES: "plugin
/// nodes loaded by class name -> explicit registration").
#[derive(Default)]
pub struct NodeRegistry {
    constructors: HashMap<&'static str, NodeConstructor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: &'static str, ctor: NodeConstructor) {
        self.constructors.insert(node_type, ctor);
    }

    pub fn is_registered(&self, node_type: &str) -> bool {
        self.constructors.contains_key(node_type)
    }

    /// Resolve `data.node_type` to a constructor and build a live node.
    /// `UnknownNodeType` on a miss — a workflow load fails loudly rather
    /// than silently skipping the node.
    pub fn load_node(&self, data: &NodeData) -> Result<Box<dyn Node>, UnknownNodeType> {
        self.constructors
            .get(data.node_type.as_str())
            .map(|ctor| ctor())
            .ok_or_else(|| UnknownNodeType(data.node_type.clone()))
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
