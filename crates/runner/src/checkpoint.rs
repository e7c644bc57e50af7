// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Checkpoint manager (spec §4.7): periodic and scope-barrier snapshots of
//! in-flight run state, so a robot can resume a job after a crash or a lost
//! connection without replaying completed steps.

use crate::error::RunnerError;
use casare_core::offline_queue::{BrowserState, CheckpointState, OfflineQueue};
use casare_core::{Clock, ExecutionContext, JobId, NodeId, SystemClock};
use std::collections::HashSet;
use std::sync::Arc;

/// Checkpoints save every `DEFAULT_CHECKPOINT_INTERVAL`th node visited, plus
/// unconditionally at every scope barrier (while/for_each/try/retry/subflow).
const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

const BROWSER_VAR_PREFIX: &str = "__browser_";

/// Convention-based capture of browser-session presence (spec §4.7):
/// concrete browser automation nodes are out of scope, so this only reads
/// the `__browser_*` context variables a future browser node would set,
/// rather than an actual session handle.
fn capture_browser_state(ctx: &ExecutionContext) -> BrowserState {
    let present = matches!(ctx.get("__browser_present", None), serde_json::Value::Bool(true));
    let active_page_name = ctx
        .variables()
        .get(&format!("{BROWSER_VAR_PREFIX}active_page_name"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let page_count =
        ctx.variables().get(&format!("{BROWSER_VAR_PREFIX}page_count")).and_then(serde_json::Value::as_u64).unwrap_or(0)
            as u32;
    BrowserState { present, active_page_name, page_count }
}

/// The point in a workflow graph a resumed run continues from (spec §4.6):
/// the last completed node and every node already visited, so the runner
/// can seed its work queue from `current_node_id`'s successors instead of
/// the start node, skipping completed work.
#[derive(Debug, Clone, Default)]
pub struct ResumePoint {
    pub current_node_id: Option<NodeId>,
    pub executed_nodes: HashSet<NodeId>,
}

/// Saves and restores [`CheckpointState`] through an [`OfflineQueue`].
pub struct CheckpointManager<C: Clock = SystemClock> {
    queue: Arc<dyn OfflineQueue>,
    clock: C,
    auto_save: bool,
    interval: usize,
}

impl CheckpointManager<SystemClock> {
    pub fn new(queue: Arc<dyn OfflineQueue>) -> Self {
        Self::with_clock(queue, SystemClock)
    }
}

impl<C: Clock> CheckpointManager<C> {
    pub fn with_clock(queue: Arc<dyn OfflineQueue>, clock: C) -> Self {
        Self { queue, clock, auto_save: true, interval: DEFAULT_CHECKPOINT_INTERVAL }
    }

    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// `0` disables interval-based saves, leaving only barrier saves.
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval;
        self
    }

    fn is_due(&self, ctx: &ExecutionContext, is_barrier: bool) -> bool {
        if !self.auto_save {
            return false;
        }
        is_barrier || (self.interval > 0 && !ctx.execution_path.is_empty() && ctx.execution_path.len() % self.interval == 0)
    }

    /// Saves a checkpoint if one is due — at every scope barrier, or every
    /// `interval` nodes visited — and returns its id when it did.
    /// `current_node_id` is the node that just finished executing.
    pub async fn maybe_save(
        &self,
        job_id: JobId,
        ctx: &ExecutionContext,
        current_node_id: NodeId,
        is_barrier: bool,
    ) -> Result<Option<casare_core::CheckpointId>, RunnerError> {
        if !self.is_due(ctx, is_barrier) {
            return Ok(None);
        }
        self.save_checkpoint(job_id, ctx, current_node_id).await.map(Some)
    }

    /// Unconditionally saves a checkpoint of the current execution state.
    /// `current_node_id` is the node that just finished executing; resume
    /// continues from its successor(s) (spec §4.6).
    pub async fn save_checkpoint(
        &self,
        job_id: JobId,
        ctx: &ExecutionContext,
        current_node_id: NodeId,
    ) -> Result<casare_core::CheckpointId, RunnerError> {
        let mut seen = HashSet::new();
        let executed_nodes: Vec<String> =
            ctx.execution_path.iter().map(ToString::to_string).filter(|id| seen.insert(id.clone())).collect();

        let state = CheckpointState {
            checkpoint_id: casare_core::CheckpointId::new(),
            job_id,
            workflow_name: ctx.workflow_name.clone(),
            current_node_id: Some(current_node_id.to_string()),
            executed_nodes,
            execution_path: ctx.execution_path.iter().map(ToString::to_string).collect(),
            variables: ctx.variables().clone(),
            scope_state: ctx.scope_state.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            errors: ctx.errors.iter().map(|(id, msg)| (id.to_string(), msg.clone())).collect(),
            created_at_ms: self.clock.epoch_ms(),
            browser_state: capture_browser_state(ctx),
        };
        let id = state.checkpoint_id.clone();
        self.queue.save_checkpoint(state).await?;
        Ok(id)
    }

    /// Restores the most recent checkpoint for `job_id` into `ctx`, returning
    /// the graph position to resume from. Returns `None` (leaving `ctx`
    /// untouched) for a fresh job.
    pub async fn restore_latest(
        &self,
        job_id: JobId,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<ResumePoint>, RunnerError> {
        let Some(state) = self.queue.latest_checkpoint_for_job(job_id).await? else {
            return Ok(None);
        };
        ctx.set_all_variables(state.variables);
        ctx.execution_path = state.execution_path.iter().map(NodeId::from_string).collect();
        ctx.scope_state = state.scope_state.into_iter().map(|(k, v)| (NodeId::from_string(k), v)).collect();
        for (node_id, message) in state.errors {
            ctx.add_error(NodeId::from_string(node_id), message);
        }

        Ok(Some(ResumePoint {
            current_node_id: state.current_node_id.map(NodeId::from_string),
            executed_nodes: state.executed_nodes.into_iter().map(NodeId::from_string).collect(),
        }))
    }

    /// Marks the start of a job's run (spec §4.7 C8); purely observational,
    /// since run state itself lives in the `ExecutionContext` passed to
    /// every other call.
    pub async fn start_job(&self, job_id: JobId, workflow_name: impl Into<String>) -> Result<(), RunnerError> {
        tracing::info!(%job_id, workflow_name = %workflow_name.into(), "job started");
        Ok(())
    }

    /// Marks a job as finished, dropping its checkpoints (spec §4.7 C8).
    pub async fn end_job(&self, job_id: JobId) -> Result<(), RunnerError> {
        self.clear(job_id).await?;
        tracing::info!(%job_id, "job ended");
        Ok(())
    }

    /// Appends `(node_id, message)` to the latest checkpoint's failure trail
    /// without waiting for the next full save (spec §4.7 C8, §7). A no-op if
    /// no checkpoint has been taken yet; the error still reaches the next
    /// full [`Self::save_checkpoint`] via `ExecutionContext::errors`.
    pub async fn record_error(&self, job_id: JobId, node_id: NodeId, message: impl Into<String>) -> Result<(), RunnerError> {
        let Some(mut state) = self.queue.latest_checkpoint_for_job(job_id).await? else {
            return Ok(());
        };
        state.errors.push((node_id.to_string(), message.into()));
        self.queue.save_checkpoint(state).await?;
        Ok(())
    }

    /// Drops every checkpoint for `job_id`, once it has completed or been
    /// abandoned.
    pub async fn clear(&self, job_id: JobId) -> Result<(), RunnerError> {
        self.queue.clear_checkpoints_for_job(job_id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
