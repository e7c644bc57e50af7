// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Concrete control-flow node implementations (spec §4.4, §4.6).
//!
//! Concrete automation nodes (browser, desktop, DB, ...) are out of scope
//! (spec §1); this module ships the control-flow primitives needed to drive
//! the runner's traversal algorithm end to end — the nodes exercised by
//! spec §8 scenarios S1–S3 — plus the variable-access nodes spec §4.3 calls
//! out as "the primary inter-node channel".
//!
//! Scope-owning nodes (`while`, `for_each`, `try`, `retry`) keep no mutable
//! state on the instance; they read and write
//! [`ExecutionContext::scope_state`] keyed by their own `node_id`, per the
//! "cyclic graphs -> scope-state map on the runner" redesign note. Node
//! instances are registered once and shared across concurrent runs.

use crate::context::ExecutionContext;
use crate::node::{
    ControlSignal, ExecutionResult, Node, NodeKind, PropertyDef, PropertySchema, PropertyType,
};
use crate::ports::{PortDecl, PortName, PortType};
use crate::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn cfg_str<'a>(config: &'a Map<String, Value>, key: &str, default: &'a str) -> String {
    config.get(key).and_then(Value::as_str).unwrap_or(default).to_string()
}

fn cfg_f64(config: &Map<String, Value>, key: &str, default: f64) -> f64 {
    config.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn cfg_u64(config: &Map<String, Value>, key: &str, default: u64) -> u64 {
    config.get(key).and_then(Value::as_u64).unwrap_or(default)
}

// ── core.start ──────────────────────────────────────────────────────────

/// The graph's entry point. Has no `exec_in` (spec §3: start nodes are
/// exempted by `is_start_node`); fires `exec_out` unconditionally.
pub struct StartNode;

impl Node for StartNode {
    fn node_type(&self) -> &'static str {
        "core.start"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Start
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult::ok()
    }
}

pub fn start_ctor() -> Box<dyn Node> {
    Box::new(StartNode)
}

// ── core.end ────────────────────────────────────────────────────────────

/// A terminal node. Declares no `exec_out`; the runner's work list simply
/// has nothing left to enqueue from here.
pub struct EndNode;

impl Node for EndNode {
    fn node_type(&self) -> &'static str {
        "core.end"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::End
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult { success: true, next_nodes: Some(Vec::new()), ..Default::default() }
    }
}

pub fn end_ctor() -> Box<dyn Node> {
    Box::new(EndNode)
}

// ── core.set_variable / core.read_variable ─────────────────────────────

/// Writes `config["value"]` into `context.variables[config["name"]]`
/// (spec §4.3: variables are the primary inter-node channel).
pub struct SetVariableNode;

impl Node for SetVariableNode {
    fn node_type(&self) -> &'static str {
        "core.set_variable"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn property_schema(&self) -> PropertySchema {
        PropertySchema(vec![
            PropertyDef {
                name: "name".into(),
                property_type: PropertyType::String,
                default: Value::from(""),
                label: "Variable".into(),
                tooltip: "Name of the variable to write".into(),
                required: true,
                order: 0,
                choices: None,
                min: None,
                max: None,
                display_when: None,
            },
            PropertyDef {
                name: "value".into(),
                property_type: PropertyType::String,
                default: Value::Null,
                label: "Value".into(),
                tooltip: "Value to assign".into(),
                required: false,
                order: 1,
                choices: None,
                min: None,
                max: None,
                display_when: None,
            },
        ])
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let name = cfg_str(config, "name", "");
        if name.is_empty() {
            return ExecutionResult::failed("Validation", "core.set_variable requires a non-empty name");
        }
        let value = config.get("value").cloned().unwrap_or(Value::Null);
        ctx.set(name, value);
        ExecutionResult::ok()
    }
}

pub fn set_variable_ctor() -> Box<dyn Node> {
    Box::new(SetVariableNode)
}

/// Copies `context.variables[config["name"]]` onto its `value` output port.
pub struct ReadVariableNode;

impl Node for ReadVariableNode {
    fn node_type(&self) -> &'static str {
        "core.read_variable"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out(), PortDecl::data("value", PortType::Any)]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let name = cfg_str(config, "name", "");
        let value = ctx.get(&name, None);
        let mut data = Map::new();
        data.insert("value".into(), value);
        ExecutionResult { success: true, data: Some(data), ..Default::default() }
    }
}

pub fn read_variable_ctor() -> Box<dyn Node> {
    Box::new(ReadVariableNode)
}

// ── core.increment_variable ─────────────────────────────────────────────

/// Adds `config["by"]` (default `1`) to the numeric variable named
/// `config["name"]`, treating a missing/non-numeric variable as `0`.
pub struct IncrementVariableNode;

impl Node for IncrementVariableNode {
    fn node_type(&self) -> &'static str {
        "core.increment_variable"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let name = cfg_str(config, "name", "");
        if name.is_empty() {
            return ExecutionResult::failed("Validation", "core.increment_variable requires a non-empty name");
        }
        let by = cfg_f64(config, "by", 1.0);
        let current = ctx.get(&name, Some(Value::from(0))).as_f64().unwrap_or(0.0);
        let next = current + by;
        let as_value = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
            Value::from(next as i64)
        } else {
            Value::from(next)
        };
        ctx.set(name, as_value);
        ExecutionResult::ok()
    }
}

pub fn increment_variable_ctor() -> Box<dyn Node> {
    Box::new(IncrementVariableNode)
}

// ── core.if ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Truthy,
    Falsy,
}

impl Comparison {
    fn parse(s: &str) -> Self {
        match s {
            "neq" => Comparison::Neq,
            "gt" => Comparison::Gt,
            "lt" => Comparison::Lt,
            "gte" => Comparison::Gte,
            "lte" => Comparison::Lte,
            "falsy" => Comparison::Falsy,
            "truthy" => Comparison::Truthy,
            _ => Comparison::Eq,
        }
    }

    fn evaluate(&self, left: &Value, right: &Value) -> bool {
        match self {
            Comparison::Truthy => is_truthy(left),
            Comparison::Falsy => !is_truthy(left),
            Comparison::Eq => left == right,
            Comparison::Neq => left != right,
            Comparison::Gt | Comparison::Lt | Comparison::Gte | Comparison::Lte => {
                match (left.as_f64(), right.as_f64()) {
                    (Some(a), Some(b)) => match self {
                        Comparison::Gt => a > b,
                        Comparison::Lt => a < b,
                        Comparison::Gte => a >= b,
                        Comparison::Lte => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Evaluates `config["variable"] <operator> config["value"]` against
/// context variables and fires `"true"` or `"false"` (spec §4.6 IfNode).
pub struct IfNode;

impl Node for IfNode {
    fn node_type(&self) -> &'static str {
        "core.if"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::If
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::control("true"), PortDecl::control("false")]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let variable = cfg_str(config, "variable", "");
        let operator = Comparison::parse(&cfg_str(config, "operator", "truthy"));
        let left = ctx.get(&variable, None);
        let right = config.get("value").cloned().unwrap_or(Value::Null);
        if operator.evaluate(&left, &right) {
            ExecutionResult::ok_with_ports(["true"])
        } else {
            ExecutionResult::ok_with_ports(["false"])
        }
    }
}

pub fn if_ctor() -> Box<dyn Node> {
    Box::new(IfNode)
}

// ── core.while ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct WhileScope {
    iteration: u64,
}

/// Re-entrant loop head (spec §4.6 WhileNode). Each entry (first, or via the
/// back-edge from `core.loop_continue`) re-checks `config["variable"]`:
/// truthy fires `"body"` and bumps `iteration`; falsy (or `max_iterations`
/// reached, a safety valve against infinite loops with no runner-visible
/// exit) clears scope state and fires `exec_out`.
pub struct WhileNode;

impl Node for WhileNode {
    fn node_type(&self) -> &'static str {
        "core.while"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::While
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::control("body"), PortDecl::exec_out()]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let variable = cfg_str(config, "variable", "");
        let max_iterations = cfg_u64(config, "max_iterations", 10_000);
        let mut scope: WhileScope =
            serde_json::from_value(ctx.scope(node_id)).unwrap_or_default();

        let condition = is_truthy(&ctx.get(&variable, None));
        if condition && scope.iteration < max_iterations {
            scope.iteration += 1;
            ctx.set_scope(node_id, serde_json::to_value(&scope).unwrap_or(Value::Null));
            ExecutionResult::ok_with_ports(["body"])
        } else {
            ctx.clear_scope(node_id);
            ExecutionResult::ok_with_ports([crate::ports::EXEC_OUT])
        }
    }
}

pub fn while_ctor() -> Box<dyn Node> {
    Box::new(WhileNode)
}

// ── core.for_each ───────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct ForEachScope {
    index: usize,
}

/// Iterates `context.variables[config["collection"]]` (spec §4.6
/// ForEachNode), binding `config["item_var"]` (default `"item"`) before
/// each `"body"` entry.
pub struct ForEachNode;

impl Node for ForEachNode {
    fn node_type(&self) -> &'static str {
        "core.for_each"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::ForEach
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::control("body"), PortDecl::exec_out()]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let collection_var = cfg_str(config, "collection", "");
        let item_var = cfg_str(config, "item_var", "item");
        let collection = ctx.get(&collection_var, Some(Value::Array(vec![])));
        let items = collection.as_array().cloned().unwrap_or_default();

        let mut scope: ForEachScope = serde_json::from_value(ctx.scope(node_id)).unwrap_or_default();

        if scope.index < items.len() {
            ctx.set(item_var, items[scope.index].clone());
            scope.index += 1;
            ctx.set_scope(node_id, serde_json::to_value(&scope).unwrap_or(Value::Null));
            ExecutionResult::ok_with_ports(["body"])
        } else {
            ctx.clear_scope(node_id);
            ExecutionResult::ok_with_ports([crate::ports::EXEC_OUT])
        }
    }
}

pub fn for_each_ctor() -> Box<dyn Node> {
    Box::new(ForEachNode)
}

// ── core.loop_continue / core.loop_break ───────────────────────────────

/// Explicit loop back-edge marker (spec §4.6: "a distinct LoopEndNode (or
/// explicit Break/Continue) returns control"). Its single `exec_out` is
/// wired back to the owning loop head in the workflow graph; the runner
/// follows that edge like any other, the `control_flow` tag is purely
/// informational (surfaced in events/checkpoints).
pub struct LoopContinueNode;

impl Node for LoopContinueNode {
    fn node_type(&self) -> &'static str {
        "core.loop_continue"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult { success: true, control_flow: Some(ControlSignal::LoopContinue), ..Default::default() }
    }
}

pub fn loop_continue_ctor() -> Box<dyn Node> {
    Box::new(LoopContinueNode)
}

/// Explicit early-exit from a loop body (spec §4.6). Its `exec_out` is
/// wired to whatever follows the loop, bypassing the loop head.
pub struct LoopBreakNode;

impl Node for LoopBreakNode {
    fn node_type(&self) -> &'static str {
        "core.loop_break"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult { success: true, control_flow: Some(ControlSignal::LoopBreak), ..Default::default() }
    }
}

pub fn loop_break_ctor() -> Box<dyn Node> {
    Box::new(LoopBreakNode)
}

// ── core.try ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct TryScope {
    opened: bool,
    error: Option<String>,
}

/// Two-phase try/catch head (spec §4.6 TryNode). The runner tracks which
/// nodes are "owned" by a given try scope (everything reachable from
/// `try_body` without crossing a nested try); a failure in an owned node
/// re-enters this node with the error recorded rather than terminating the
/// run. First entry: marks the scope open, fires `try_body`. Re-entry with
/// a recorded error: fires `catch`. Re-entry without an error (the
/// `try_body` branch completed and looped back): fires `success`.
pub struct TryNode;

impl Node for TryNode {
    fn node_type(&self) -> &'static str {
        "core.try"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Try
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::control("try_body"), PortDecl::control("catch"), PortDecl::control("success")]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let mut scope: TryScope = serde_json::from_value(ctx.scope(node_id)).unwrap_or_default();

        if !scope.opened {
            scope.opened = true;
            ctx.set_scope(node_id, serde_json::to_value(&scope).unwrap_or(Value::Null));
            return ExecutionResult::ok_with_ports(["try_body"]);
        }

        if let Some(error) = scope.error.take() {
            ctx.set("error", Value::from(error));
            ctx.clear_scope(node_id);
            ExecutionResult::ok_with_ports(["catch"])
        } else {
            ctx.clear_scope(node_id);
            ExecutionResult::ok_with_ports(["success"])
        }
    }
}

pub fn try_ctor() -> Box<dyn Node> {
    Box::new(TryNode)
}

/// Marks the end of a `try_body` branch on its happy path, looping control
/// back to the owning [`TryNode`] (wired in the graph) so it can route to
/// `"success"`.
pub struct TryEndNode;

impl Node for TryEndNode {
    fn node_type(&self) -> &'static str {
        "core.try_end"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult::ok()
    }
}

pub fn try_end_ctor() -> Box<dyn Node> {
    Box::new(TryEndNode)
}

/// Finally-equivalent: runs unconditionally after a try scope resolves
/// (whichever of `catch`/`success` fired), recording any pending context
/// error before continuing (spec §4.6: "Finally semantics handled by
/// OnErrorNode").
pub struct OnErrorNode;

impl Node for OnErrorNode {
    fn node_type(&self) -> &'static str {
        "core.on_error"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let error = ctx.get("error", None);
        if !error.is_null() {
            ctx.add_error(node_id, error.as_str().unwrap_or("unknown error").to_string());
        }
        ExecutionResult::ok()
    }
}

pub fn on_error_ctor() -> Box<dyn Node> {
    Box::new(OnErrorNode)
}

// ── core.retry / core.retry_success / core.retry_fail ──────────────────

#[derive(Debug, Serialize, Deserialize)]
struct RetryScope {
    attempt: u32,
    max_attempts: u32,
    initial_delay_ms: u64,
    backoff_multiplier: f64,
    failed: bool,
}

/// Re-entrant retry head (spec §4.6 RetryNode / scenario S3). First entry
/// seeds `{attempt: 0, max_attempts, initial_delay, backoff_multiplier}`
/// into scope state and fires `"body"`. Re-entry (driven by the runner
/// after the owned body fails) bumps `attempt`; if under `max_attempts`,
/// fires `"body"` again (the runner sleeps the backoff delay before the
/// 2nd+ attempt, per spec — this node only tracks the count); once
/// exhausted, fires `"failed"`. [`RetrySuccessNode`]/[`RetryFailNode`]
/// close the loop: reaching either clears the scope.
pub struct RetryNode;

impl RetryNode {
    /// Backoff delay before the attempt numbered `attempt` (1-indexed),
    /// per spec §4.2: `min(initial * multiplier^(n-1), max_delay)`. No
    /// delay before the first attempt.
    pub fn delay_for_attempt(scope: &RetryScope, attempt: u32) -> std::time::Duration {
        if attempt <= 1 {
            return std::time::Duration::ZERO;
        }
        let millis = scope.initial_delay_ms as f64 * scope.backoff_multiplier.powi(attempt as i32 - 2);
        std::time::Duration::from_millis(millis.round() as u64)
    }
}

impl Node for RetryNode {
    fn node_type(&self) -> &'static str {
        "core.retry"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Retry
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::control("body"), PortDecl::control("failed")]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let existing = ctx.scope(node_id);
        let mut scope: RetryScope = if existing.is_null() {
            RetryScope {
                attempt: 0,
                max_attempts: cfg_u64(config, "max_attempts", 3) as u32,
                initial_delay_ms: cfg_u64(config, "initial_delay_ms", 100),
                backoff_multiplier: cfg_f64(config, "backoff_multiplier", 2.0),
                failed: false,
            }
        } else {
            serde_json::from_value(existing).unwrap_or(RetryScope {
                attempt: 0,
                max_attempts: 3,
                initial_delay_ms: 100,
                backoff_multiplier: 2.0,
                failed: false,
            })
        };

        scope.attempt += 1;
        if scope.attempt > scope.max_attempts {
            ctx.clear_scope(node_id);
            return ExecutionResult { success: true, next_nodes: Some(vec!["failed".into()]), control_flow: Some(ControlSignal::RetryFail), ..Default::default() };
        }
        ctx.set_scope(node_id, serde_json::to_value(&scope).unwrap_or(Value::Null));
        ExecutionResult::ok_with_ports(["body"])
    }
}

pub fn retry_ctor() -> Box<dyn Node> {
    Box::new(RetryNode)
}

/// Reached when the retried body succeeds; clears the owning retry's scope
/// state (the runner resolves ownership the same way as for try scopes).
pub struct RetrySuccessNode;

impl Node for RetrySuccessNode {
    fn node_type(&self) -> &'static str {
        "core.retry_success"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult { success: true, control_flow: Some(ControlSignal::RetrySuccess), ..Default::default() }
    }
}

pub fn retry_success_ctor() -> Box<dyn Node> {
    Box::new(RetrySuccessNode)
}

/// Explicitly records a failed attempt within a retry body; the runner
/// treats reaching this node the same as an ordinary node failure owned by
/// the enclosing retry scope (re-enters [`RetryNode`]).
pub struct RetryFailNode;

impl Node for RetryFailNode {
    fn node_type(&self) -> &'static str {
        "core.retry_fail"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let message = cfg_str(config, "message", "retry body failed");
        ExecutionResult { success: false, error: Some(message), error_type: Some("Transient".into()), control_flow: Some(ControlSignal::RetryFail), ..Default::default() }
    }
}

pub fn retry_fail_ctor() -> Box<dyn Node> {
    Box::new(RetryFailNode)
}

// ── core.throw_error / core.assert ──────────────────────────────────────

/// Unconditionally fails (spec §4.6: "produce failure ExecutionResults;
/// handled exactly as any other failure").
pub struct ThrowErrorNode;

impl Node for ThrowErrorNode {
    fn node_type(&self) -> &'static str {
        "core.throw_error"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Throw
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let message = cfg_str(config, "message", "explicit throw");
        let error_type = cfg_str(config, "error_type", "Fatal");
        ExecutionResult::failed(error_type, message)
    }
}

pub fn throw_error_ctor() -> Box<dyn Node> {
    Box::new(ThrowErrorNode)
}

/// Fails unless `config["variable"]` is truthy (spec §4.6 AssertNode).
pub struct AssertNode;

impl Node for AssertNode {
    fn node_type(&self) -> &'static str {
        "core.assert"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Assert
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        _node_id: NodeId,
        config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        let variable = cfg_str(config, "variable", "");
        let value = ctx.get(&variable, None);
        if is_truthy(&value) {
            ExecutionResult::ok()
        } else {
            let message = cfg_str(config, "message", &format!("assertion failed: {variable} was not truthy"));
            ExecutionResult::failed("Validation", message)
        }
    }
}

pub fn assert_ctor() -> Box<dyn Node> {
    Box::new(AssertNode)
}

// ── core.subflow_invoke ──────────────────────────────────────────────────

/// Marker node for nested-workflow invocation (spec §4.6 SubflowInvokeNode).
/// The runner special-cases `NodeKind::SubflowInvoke`: it loads the
/// workflow named by `config["subflow_path"]`, maps `config["input_map"]`/
/// `config["output_map"]` (port name -> parent variable name) into/out of
/// the *same* [`ExecutionContext`] namespace, and drives a nested `Runner`
/// to completion before continuing. `execute` itself is never called by a
/// conformant runner; it exists so the node satisfies the [`Node`] trait
/// for registry/workflow-validation purposes and fails loudly if invoked
/// directly (e.g. by a test harness that doesn't special-case the kind).
pub struct SubflowInvokeNode;

impl Node for SubflowInvokeNode {
    fn node_type(&self) -> &'static str {
        "core.subflow_invoke"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::SubflowInvoke
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult::failed("Fatal", "core.subflow_invoke must be special-cased by the runner, not executed directly")
    }
}

pub fn subflow_invoke_ctor() -> Box<dyn Node> {
    Box::new(SubflowInvokeNode)
}

// ── core.regular (generic pass-through, for tests/fixtures) ─────────────

/// A plain pass-through node with no side effects, used by tests and as a
/// placeholder for the concrete automation nodes this spec treats as
/// external collaborators.
pub struct RegularNode;

impl Node for RegularNode {
    fn node_type(&self) -> &'static str {
        "core.regular"
    }

    fn input_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_in()]
    }

    fn output_ports(&self) -> Vec<PortDecl> {
        vec![PortDecl::exec_out()]
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext,
        _node_id: NodeId,
        _config: &Map<String, Value>,
        _inputs: &HashMap<PortName, Value>,
    ) -> ExecutionResult {
        ExecutionResult::ok()
    }
}

pub fn regular_ctor() -> Box<dyn Node> {
    Box::new(RegularNode)
}

/// Registers every node type in this module into `registry` (spec §4.4:
/// explicit registration at startup, no import-time side effects).
pub fn register_builtin_nodes(registry: &mut crate::node::NodeRegistry) {
    registry.register("core.start", start_ctor);
    registry.register("core.end", end_ctor);
    registry.register("core.set_variable", set_variable_ctor);
    registry.register("core.read_variable", read_variable_ctor);
    registry.register("core.increment_variable", increment_variable_ctor);
    registry.register("core.if", if_ctor);
    registry.register("core.while", while_ctor);
    registry.register("core.for_each", for_each_ctor);
    registry.register("core.loop_continue", loop_continue_ctor);
    registry.register("core.loop_break", loop_break_ctor);
    registry.register("core.try", try_ctor);
    registry.register("core.try_end", try_end_ctor);
    registry.register("core.on_error", on_error_ctor);
    registry.register("core.retry", retry_ctor);
    registry.register("core.retry_success", retry_success_ctor);
    registry.register("core.retry_fail", retry_fail_ctor);
    registry.register("core.throw_error", throw_error_ctor);
    registry.register("core.assert", assert_ctor);
    registry.register("core.subflow_invoke", subflow_invoke_ctor);
    registry.register("core.regular", regular_ctor);
}

#[cfg(test)]
#[path = "nodes_tests.rs"]
mod tests;
