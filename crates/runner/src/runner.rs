// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! The workflow interpreter (spec §4.6): a single cooperative traversal loop
//! over a hydrated [`Workflow`], suspending only between node executions.

use crate::checkpoint::{CheckpointManager, ResumePoint};
use crate::error::RunnerError;
use casare_core::event::{Event, EventKind};
use casare_core::node::{ExecutionResult, Node, NodeKind, NodeRegistry};
use casare_core::ports::{ControlFlow, EXEC_OUT};
use casare_core::workflow::Workflow;
use casare_core::{Clock, EventBus, ExecutionContext, JobId, NodeId, SystemClock};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Mirrors spec §4.6's run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
    Completed,
    Failed,
}

/// Shared pause/resume/stop gate for one run (spec §4.6, §5). Suspension is
/// only observed between node executions.
pub struct RunControl {
    state: Mutex<ExecutionState>,
    notify: Notify,
}

impl Default for RunControl {
    fn default() -> Self {
        Self { state: Mutex::new(ExecutionState::Idle), notify: Notify::new() }
    }
}

impl RunControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.lock()
    }

    fn set(&self, next: ExecutionState) {
        *self.state.lock() = next;
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if *state == ExecutionState::Running {
            *state = ExecutionState::Paused;
        }
    }

    pub fn resume(&self) {
        {
            let mut state = self.state.lock();
            if *state == ExecutionState::Paused {
                *state = ExecutionState::Running;
            }
        }
        self.notify.notify_waiters();
    }

    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, ExecutionState::Running | ExecutionState::Paused) {
                *state = ExecutionState::Stopping;
            }
        }
        self.notify.notify_waiters();
    }

    /// Fires an external `stop()` once `duration` elapses.
    pub fn cancel_after(self: &Arc<Self>, duration: Duration) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            this.stop();
        });
    }

    /// Blocks at a suspension point while paused. Returns `false` if a stop
    /// was requested (either before or while waiting).
    async fn wait_at_suspension_point(&self) -> bool {
        loop {
            match self.state() {
                ExecutionState::Stopping | ExecutionState::Stopped => return false,
                ExecutionState::Paused => self.notify.notified().await,
                _ => return true,
            }
        }
    }
}

/// Terminal shape of one `Runner::run` call (spec §4.6).
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed { variables: HashMap<String, Value>, execution_path: Vec<NodeId> },
    Failed { error: String, error_type: String, execution_path: Vec<NodeId> },
    Stopped { execution_path: Vec<NodeId> },
}

const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_SUBFLOW_DEPTH: u32 = 32;

/// One configured interpreter, reusable across runs: each run supplies its
/// own [`ExecutionContext`]/[`RunControl`] pair, so nothing here is
/// run-specific.
pub struct Runner<C: Clock = SystemClock> {
    registry: Arc<NodeRegistry>,
    events: EventBus,
    clock: C,
    default_node_timeout: Duration,
    workflow_dir: Option<PathBuf>,
}

impl Runner<SystemClock> {
    pub fn new(registry: Arc<NodeRegistry>, events: EventBus) -> Self {
        Self::with_clock(registry, events, SystemClock)
    }
}

impl<C: Clock> Runner<C> {
    pub fn with_clock(registry: Arc<NodeRegistry>, events: EventBus, clock: C) -> Self {
        Self { registry, events, clock, default_node_timeout: DEFAULT_NODE_TIMEOUT, workflow_dir: None }
    }

    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout = timeout;
        self
    }

    /// Base directory nested `SubflowInvoke` nodes resolve `subflow_path`
    /// against. Required only if the workflow uses subflows.
    pub fn with_workflow_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflow_dir = Some(dir.into());
        self
    }

    /// `executed / total` in percent (spec §4.6); `0` for an empty workflow.
    pub fn progress(ctx: &ExecutionContext, workflow: &Workflow) -> f64 {
        if workflow.nodes.is_empty() {
            return 0.0;
        }
        (ctx.execution_path.len() as f64 / workflow.nodes.len() as f64) * 100.0
    }

    pub async fn run(
        &self,
        workflow: &Workflow,
        ctx: &mut ExecutionContext,
        control: &Arc<RunControl>,
        checkpoints: Option<(&CheckpointManager<C>, JobId)>,
    ) -> Result<RunOutcome, RunnerError> {
        let resume = if let Some((manager, job_id)) = &checkpoints {
            manager.start_job(*job_id, workflow.metadata.name.clone()).await?;
            manager.restore_latest(*job_id, ctx).await?
        } else {
            None
        };

        let outcome = self.run_depth(workflow, ctx, control, checkpoints, 0, resume).await?;

        if let Some((manager, job_id)) = &checkpoints {
            if matches!(outcome, RunOutcome::Completed { .. }) {
                manager.end_job(*job_id).await?;
            }
        }
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_depth<'a>(
        &'a self,
        workflow: &'a Workflow,
        ctx: &'a mut ExecutionContext,
        control: &'a Arc<RunControl>,
        checkpoints: Option<(&'a CheckpointManager<C>, JobId)>,
        depth: u32,
        resume: Option<ResumePoint>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RunOutcome, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_SUBFLOW_DEPTH {
                return Err(RunnerError::SubflowTooDeep(workflow.metadata.name.clone()));
            }

            let nodes = hydrate(workflow, &self.registry)?;
            let control_out = control_edges(workflow, &nodes);
            let data_in = data_edges(workflow, &nodes);
            let scope_owner = scope_ownership(workflow, &nodes);

            let start = workflow.find_start_node()?;
            if depth == 0 {
                control.set(ExecutionState::Running);
                self.events.publish(Event::new(EventKind::WorkflowStarted, self.clock.epoch_ms()));
            }

            let mut outputs: HashMap<(NodeId, String), Value> = HashMap::new();
            let mut queue: VecDeque<NodeId> = VecDeque::new();

            match resume {
                // Resuming: skip straight to the successor(s) of the node
                // that completed last, rather than re-running from start.
                Some(ResumePoint { current_node_id: Some(current), executed_nodes }) => {
                    for ((source, _port), targets) in control_out.iter() {
                        if *source != current {
                            continue;
                        }
                        for target in targets {
                            if !executed_nodes.contains(target) {
                                queue.push_back(*target);
                            }
                        }
                    }
                }
                _ => queue.push_back(start),
            }

            while let Some(node_id) = queue.pop_front() {
                if !control.wait_at_suspension_point().await {
                    if depth == 0 {
                        control.set(ExecutionState::Stopped);
                        self.events.publish(Event::new(EventKind::WorkflowStopped, self.clock.epoch_ms()));
                    }
                    return Ok(RunOutcome::Stopped { execution_path: ctx.execution_path.clone() });
                }

                let node = nodes.get(&node_id).expect("node resolved from the same workflow graph");
                let data = &workflow.nodes[&node_id];

                if node.kind() == NodeKind::SubflowInvoke {
                    match self.run_subflow(node_id, data, ctx, control, depth).await? {
                        SubflowOutcome::Continue => {
                            ctx.record_visit(node_id);
                            if let Some((manager, job_id)) = &checkpoints {
                                if let Err(e) = manager.maybe_save(*job_id, ctx, node_id, node.kind().is_scope()).await {
                                    tracing::warn!(error = %e, node = %node_id, "checkpoint save failed");
                                }
                            }
                            for target in control_out.get(&(node_id, EXEC_OUT.to_string())).into_iter().flatten() {
                                queue.push_back(*target);
                            }
                        }
                        SubflowOutcome::Stopped => {
                            if depth == 0 {
                                control.set(ExecutionState::Stopped);
                            }
                            return Ok(RunOutcome::Stopped { execution_path: ctx.execution_path.clone() });
                        }
                        SubflowOutcome::Failed { error, error_type } => {
                            if let Some(outcome) = self
                                .terminate_failed(
                                    ctx, control, node_id, &scope_owner, &mut queue, depth, checkpoints, error, error_type,
                                )
                                .await?
                            {
                                return Ok(outcome);
                            }
                        }
                    }
                    continue;
                }

                let inputs = gather_inputs(node_id, node.as_ref(), &data_in, &outputs);
                ctx.record_visit(node_id);
                self.events.publish(Event::new(EventKind::NodeStarted, self.clock.epoch_ms()).with_node(node_id));

                let timeout = node.timeout().unwrap_or(self.default_node_timeout);
                let started = self.clock.now();
                let result = node.execute(ctx, node_id, &data.config, &inputs);
                let elapsed = self.clock.now().saturating_duration_since(started);
                let result = if elapsed > timeout {
                    ExecutionResult::failed("Timeout", format!("node {node_id} exceeded its {timeout:?} timeout"))
                } else {
                    result
                };

                if !result.success {
                    self.events.publish(
                        Event::new(EventKind::NodeError, self.clock.epoch_ms())
                            .with_node(node_id)
                            .with_message(result.error.clone().unwrap_or_default()),
                    );
                    let error = result.error.clone().unwrap_or_default();
                    let error_type = result.error_type.clone().unwrap_or_else(|| "Fatal".into());
                    if let Some(outcome) = self
                        .terminate_failed(
                            ctx, control, node_id, &scope_owner, &mut queue, depth, checkpoints, error, error_type,
                        )
                        .await?
                    {
                        return Ok(outcome);
                    }
                    continue;
                }

                self.events.publish(Event::new(EventKind::NodeCompleted, self.clock.epoch_ms()).with_node(node_id));
                if let Some(data) = result.data.clone() {
                    for (port, value) in data {
                        outputs.insert((node_id, port), value);
                    }
                }

                if let Some((manager, job_id)) = &checkpoints {
                    if let Err(e) = manager.maybe_save(*job_id, ctx, node_id, node.kind().is_scope()).await {
                        tracing::warn!(error = %e, node = %node_id, "checkpoint save failed");
                    }
                }

                // core.retry_success signals the retried body succeeded, but
                // doesn't itself clear the owning retry's scope state (it has
                // no way to know the owner's node id); the runner does it here.
                if node.node_type() == "core.retry_success" {
                    if let Some((owner_id, NodeKind::Retry)) = scope_owner.get(&node_id).copied() {
                        ctx.clear_scope(owner_id);
                    }
                }

                for port in result.fired_ports() {
                    for target in control_out.get(&(node_id, port.clone())).into_iter().flatten() {
                        queue.push_back(*target);
                    }
                }
            }

            if depth == 0 {
                control.set(ExecutionState::Completed);
                self.events.publish(Event::new(EventKind::WorkflowCompleted, self.clock.epoch_ms()));
            }
            Ok(RunOutcome::Completed { variables: ctx.variables().clone(), execution_path: ctx.execution_path.clone() })
        })
    }

    /// On failure: re-enter the nearest enclosing try/retry scope if one
    /// owns `node_id` (returning `None`, meaning "keep looping"); otherwise
    /// terminate the run (spec §4.6 step 3h), returning `Some(outcome)`.
    #[allow(clippy::too_many_arguments)]
    async fn terminate_failed(
        &self,
        ctx: &mut ExecutionContext,
        control: &Arc<RunControl>,
        node_id: NodeId,
        scope_owner: &HashMap<NodeId, (NodeId, NodeKind)>,
        queue: &mut VecDeque<NodeId>,
        depth: u32,
        checkpoints: Option<(&CheckpointManager<C>, JobId)>,
        error: String,
        error_type: String,
    ) -> Result<Option<RunOutcome>, RunnerError> {
        ctx.add_error(node_id, error.clone());
        if let Some((manager, job_id)) = &checkpoints {
            if let Err(e) = manager.record_error(*job_id, node_id, error.clone()).await {
                tracing::warn!(error = %e, node = %node_id, "checkpoint error record failed");
            }
        }

        if let Some((owner_id, owner_kind)) = scope_owner.get(&node_id).copied() {
            match owner_kind {
                NodeKind::Try => {
                    let mut scope = ctx.scope(owner_id);
                    if !scope.is_object() {
                        scope = serde_json::json!({});
                    }
                    if let Some(obj) = scope.as_object_mut() {
                        obj.insert("opened".into(), Value::Bool(true));
                        obj.insert("error".into(), Value::String(error));
                    }
                    ctx.set_scope(owner_id, scope);
                }
                NodeKind::Retry => {
                    let delay = retry_backoff_delay(&ctx.scope(owner_id));
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                }
                _ => {}
            }
            queue.push_back(owner_id);
            return Ok(None);
        }

        if depth == 0 {
            control.set(ExecutionState::Failed);
            self.events.publish(
                Event::new(EventKind::WorkflowFailed, self.clock.epoch_ms())
                    .with_node(node_id)
                    .with_message(error_type.clone()),
            );
        }
        Ok(Some(RunOutcome::Failed { error, error_type, execution_path: ctx.execution_path.clone() }))
    }

    async fn run_subflow(
        &self,
        node_id: NodeId,
        data: &casare_core::node::NodeData,
        ctx: &mut ExecutionContext,
        control: &Arc<RunControl>,
        depth: u32,
    ) -> Result<SubflowOutcome, RunnerError> {
        let path = data
            .config
            .get("subflow_path")
            .and_then(Value::as_str)
            .ok_or_else(|| RunnerError::SubflowLoad(node_id.to_string(), "missing subflow_path config".into()))?;
        let dir = self
            .workflow_dir
            .clone()
            .ok_or_else(|| RunnerError::SubflowLoad(path.to_string(), "no workflow_dir configured".into()))?;
        let full_path = dir.join(path);
        let subflow = Workflow::load_from_file(&full_path, &self.registry)
            .map_err(|e| RunnerError::SubflowLoad(path.to_string(), e.to_string()))?;

        match self.run_depth(&subflow, ctx, control, None, depth + 1, None).await? {
            RunOutcome::Completed { .. } => Ok(SubflowOutcome::Continue),
            RunOutcome::Stopped { .. } => Ok(SubflowOutcome::Stopped),
            RunOutcome::Failed { error, error_type, .. } => Ok(SubflowOutcome::Failed { error, error_type }),
        }
    }
}

enum SubflowOutcome {
    Continue,
    Stopped,
    Failed { error: String, error_type: String },
}

fn hydrate(workflow: &Workflow, registry: &NodeRegistry) -> Result<IndexMap<NodeId, Box<dyn Node>>, RunnerError> {
    let mut nodes = IndexMap::new();
    for data in workflow.nodes.values() {
        nodes.insert(data.node_id, registry.load_node(data)?);
    }
    Ok(nodes)
}

/// `(source_node, source_port) -> [target_node]` for every control edge.
fn control_edges(
    workflow: &Workflow,
    nodes: &IndexMap<NodeId, Box<dyn Node>>,
) -> HashMap<(NodeId, String), Vec<NodeId>> {
    let mut out: HashMap<(NodeId, String), Vec<NodeId>> = HashMap::new();
    for conn in &workflow.connections {
        let Some(source) = nodes.get(&conn.source_node) else { continue };
        let is_control = source
            .output_ports()
            .into_iter()
            .find(|p| p.name == conn.source_port)
            .map(|p| p.flow.is_control())
            .unwrap_or(false);
        if is_control {
            out.entry((conn.source_node, conn.source_port.as_str().to_string())).or_default().push(conn.target_node);
        }
    }
    out
}

/// `(target_node, target_port) -> (source_node, source_port)` for every data edge.
fn data_edges(
    workflow: &Workflow,
    nodes: &IndexMap<NodeId, Box<dyn Node>>,
) -> HashMap<(NodeId, String), (NodeId, String)> {
    let mut ins = HashMap::new();
    for conn in &workflow.connections {
        let Some(source) = nodes.get(&conn.source_node) else { continue };
        let is_data = source
            .output_ports()
            .into_iter()
            .find(|p| p.name == conn.source_port)
            .map(|p| matches!(p.flow, ControlFlow::Data(_)))
            .unwrap_or(false);
        if is_data {
            ins.insert(
                (conn.target_node, conn.target_port.as_str().to_string()),
                (conn.source_node, conn.source_port.as_str().to_string()),
            );
        }
    }
    ins
}

fn gather_inputs(
    node_id: NodeId,
    node: &dyn Node,
    data_in: &HashMap<(NodeId, String), (NodeId, String)>,
    outputs: &HashMap<(NodeId, String), Value>,
) -> HashMap<casare_core::PortName, Value> {
    let mut inputs = HashMap::new();
    for port in node.input_ports() {
        if !matches!(port.flow, ControlFlow::Data(_)) {
            continue;
        }
        if let Some((src_node, src_port)) = data_in.get(&(node_id, port.name.as_str().to_string())) {
            if let Some(value) = outputs.get(&(*src_node, src_port.clone())) {
                inputs.insert(port.name.clone(), value.clone());
            }
        }
    }
    inputs
}

/// Nodes reachable from a try/retry scope's body port, not crossing into a
/// nested scope's own body. Maps an owned node to `(scope_id, scope_kind)`
/// so failure handling knows which recovery shape to apply.
fn scope_ownership(
    workflow: &Workflow,
    nodes: &IndexMap<NodeId, Box<dyn Node>>,
) -> HashMap<NodeId, (NodeId, NodeKind)> {
    let mut owner = HashMap::new();
    for (scope_id, node) in nodes {
        let start_port = match node.kind() {
            NodeKind::Try => "try_body",
            NodeKind::Retry => "body",
            _ => continue,
        };

        let mut queue: VecDeque<NodeId> = workflow
            .connections
            .iter()
            .filter(|c| c.source_node == *scope_id && c.source_port.as_str() == start_port)
            .map(|c| c.target_node)
            .collect();
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(n) = queue.pop_front() {
            if n == *scope_id || !visited.insert(n) {
                continue;
            }
            owner.entry(n).or_insert((*scope_id, node.kind()));

            let is_nested_scope =
                nodes.get(&n).map(|nd| matches!(nd.kind(), NodeKind::Try | NodeKind::Retry)).unwrap_or(false);
            if is_nested_scope {
                continue;
            }
            for conn in &workflow.connections {
                if conn.source_node == n {
                    queue.push_back(conn.target_node);
                }
            }
        }
    }
    owner
}

/// Replicates `RetryNode::delay_for_attempt` (spec §4.2) from the scope's
/// raw JSON, since the runner only ever sees scope state as a
/// [`serde_json::Value`], not the node's private `RetryScope` type.
fn retry_backoff_delay(scope: &Value) -> Duration {
    let attempt = scope.get("attempt").and_then(Value::as_u64).unwrap_or(0);
    let initial_ms = scope.get("initial_delay_ms").and_then(Value::as_u64).unwrap_or(100);
    let multiplier = scope.get("backoff_multiplier").and_then(Value::as_f64).unwrap_or(2.0);
    let next_attempt = attempt + 1;
    if next_attempt <= 1 {
        return Duration::ZERO;
    }
    let millis = initial_ms as f64 * multiplier.powi(next_attempt as i32 - 2);
    Duration::from_millis(millis.round() as u64)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
