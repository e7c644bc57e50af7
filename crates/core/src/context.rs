// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Per-run execution context (spec §3, §4.3).

use crate::NodeId;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

/// A resource release callback, run once when the owning [`ResourceScope`]
/// tears down or the resource is explicitly released.
type ReleaseFn = Box<dyn FnOnce(Box<dyn Any + Send>) + Send>;

struct Owned {
    name: String,
    handle: Option<Box<dyn Any + Send>>,
    release: Option<ReleaseFn>,
}

/// Exclusive owner of externally-acquired resource handles for one run
/// (a browser session, a DB connection, ...). Resources are released in
/// reverse-acquisition order on teardown; release errors/panics are logged,
/// never propagated, so teardown always completes.
#[derive(Default)]
pub struct ResourceScope {
    owned: Vec<Owned>,
    torn_down: bool,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an acquired resource with the callback that releases it.
    pub fn register<T: Send + 'static>(
        &mut self,
        name: impl Into<String>,
        handle: T,
        release: impl FnOnce(T) + Send + 'static,
    ) {
        let release: ReleaseFn = Box::new(move |boxed: Box<dyn Any + Send>| {
            if let Ok(concrete) = boxed.downcast::<T>() {
                release(*concrete);
            }
        });
        self.owned.push(Owned { name: name.into(), handle: Some(Box::new(handle)), release: Some(release) });
    }

    /// Names of resources still held, in acquisition order.
    pub fn held_names(&self) -> Vec<&str> {
        self.owned.iter().map(|o| o.name.as_str()).collect()
    }

    /// Release every held resource in reverse-acquisition order. Idempotent:
    /// calling twice is a no-op the second time.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for owned in self.owned.iter_mut().rev() {
            let name = owned.name.clone();
            if let (Some(handle), Some(release)) = (owned.handle.take(), owned.release.take()) {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| release(handle)));
                if result.is_err() {
                    tracing::error!(resource = %name, "resource release panicked during teardown");
                }
            }
        }
        self.owned.clear();
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Created per run, destroyed on terminal state (spec §3). Owns the
/// variable store that is the primary inter-node channel
/// (`ReadVariable`/`WriteVariable` nodes), the execution path, the error
/// list, and the resource scope.
pub struct ExecutionContext {
    pub workflow_name: String,
    variables: HashMap<String, Value>,
    pub execution_path: Vec<NodeId>,
    pub errors: Vec<(NodeId, String)>,
    pub resources: ResourceScope,
    /// Per-run state for scope nodes (while/for_each/try/retry/subflow_invoke),
    /// keyed by the owning node's id rather than held on the node instance
    /// itself, since node instances are shared, stateless, and `Sync` across
    /// concurrent runs.
    pub scope_state: HashMap<NodeId, Value>,
}

impl ExecutionContext {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            variables: HashMap::new(),
            execution_path: Vec::new(),
            errors: Vec::new(),
            resources: ResourceScope::new(),
            scope_state: HashMap::new(),
        }
    }

    /// Never fails: returns `default` (or `Value::Null` when `default` is
    /// `None`) if `name` isn't set.
    pub fn get(&self, name: &str, default: Option<Value>) -> Value {
        self.variables.get(name).cloned().unwrap_or_else(|| default.unwrap_or(Value::Null))
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.variables
    }

    /// Replace the entire variable map (used when restoring a checkpoint).
    pub fn set_all_variables(&mut self, variables: HashMap<String, Value>) {
        self.variables = variables;
    }

    /// Append-only; never throws.
    pub fn add_error(&mut self, node_id: NodeId, message: impl Into<String>) {
        self.errors.push((node_id, message.into()));
    }

    pub fn record_visit(&mut self, node_id: NodeId) {
        self.execution_path.push(node_id);
    }

    /// Scope state for one scope node, or `Value::Null` if it hasn't entered
    /// yet. Never fails, mirroring [`ExecutionContext::get`].
    pub fn scope(&self, node_id: NodeId) -> Value {
        self.scope_state.get(&node_id).cloned().unwrap_or(Value::Null)
    }

    pub fn set_scope(&mut self, node_id: NodeId, value: Value) {
        self.scope_state.insert(node_id, value);
    }

    pub fn clear_scope(&mut self, node_id: NodeId) {
        self.scope_state.remove(&node_id);
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
