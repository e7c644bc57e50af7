// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use crate::context::ExecutionContext;

fn ctx() -> ExecutionContext {
    ExecutionContext::new("test")
}

fn empty_inputs() -> HashMap<PortName, Value> {
    HashMap::new()
}

#[test]
fn set_then_increment_variable_matches_scenario_s1() {
    let mut context = ctx();
    let mut config = Map::new();
    config.insert("name".into(), Value::from("counter"));
    config.insert("value".into(), Value::from(0));
    let set = SetVariableNode;
    assert!(set.execute(&mut context, NodeId::new(), &config, &empty_inputs()).success);
    assert_eq!(context.get("counter", None), Value::from(0));

    let mut incr_config = Map::new();
    incr_config.insert("name".into(), Value::from("counter"));
    incr_config.insert("by".into(), Value::from(5));
    let incr = IncrementVariableNode;
    assert!(incr.execute(&mut context, NodeId::new(), &incr_config, &empty_inputs()).success);
    assert_eq!(context.get("counter", None), Value::from(5));
}

#[test]
fn if_node_fires_true_branch_matches_scenario_s2() {
    let mut context = ctx();
    context.set("x", Value::from(10));
    let mut config = Map::new();
    config.insert("variable".into(), Value::from("x"));
    config.insert("operator".into(), Value::from("gt"));
    config.insert("value".into(), Value::from(5));

    let result = IfNode.execute(&mut context, NodeId::new(), &config, &empty_inputs());
    assert_eq!(result.fired_ports(), vec!["true".to_string()]);
}

#[test]
fn if_node_fires_false_branch_when_condition_fails() {
    let mut context = ctx();
    context.set("x", Value::from(1));
    let mut config = Map::new();
    config.insert("variable".into(), Value::from("x"));
    config.insert("operator".into(), Value::from("gt"));
    config.insert("value".into(), Value::from(5));

    let result = IfNode.execute(&mut context, NodeId::new(), &config, &empty_inputs());
    assert_eq!(result.fired_ports(), vec!["false".to_string()]);
}

#[test]
fn retry_node_tracks_attempts_and_exhausts_matches_scenario_s3() {
    let mut context = ctx();
    let node_id = NodeId::new();
    let mut config = Map::new();
    config.insert("max_attempts".into(), Value::from(3));
    config.insert("initial_delay_ms".into(), Value::from(10));
    config.insert("backoff_multiplier".into(), Value::from(2));

    // Attempt 1, 2, 3 all fire "body".
    for _ in 0..3 {
        let result = RetryNode.execute(&mut context, node_id, &config, &empty_inputs());
        assert_eq!(result.fired_ports(), vec!["body".to_string()]);
    }
    // Attempt 4 exceeds max_attempts -> "failed".
    let result = RetryNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(result.fired_ports(), vec!["failed".to_string()]);
    assert_eq!(result.control_flow, Some(ControlSignal::RetryFail));
}

#[test]
fn retry_backoff_matches_spec_formula() {
    let scope = RetryScope { attempt: 0, max_attempts: 3, initial_delay_ms: 10, backoff_multiplier: 2.0, failed: false };
    assert_eq!(RetryNode::delay_for_attempt(&scope, 1), std::time::Duration::ZERO);
    assert_eq!(RetryNode::delay_for_attempt(&scope, 2), std::time::Duration::from_millis(10));
    assert_eq!(RetryNode::delay_for_attempt(&scope, 3), std::time::Duration::from_millis(20));
}

#[test]
fn while_node_loops_until_condition_false() {
    let mut context = ctx();
    context.set("go", Value::from(true));
    let node_id = NodeId::new();
    let mut config = Map::new();
    config.insert("variable".into(), Value::from("go"));

    let first = WhileNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(first.fired_ports(), vec!["body".to_string()]);

    context.set("go", Value::from(false));
    let second = WhileNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(second.fired_ports(), vec![crate::ports::EXEC_OUT.to_string()]);
    assert_eq!(context.scope(node_id), Value::Null);
}

#[test]
fn for_each_node_binds_item_and_advances_index() {
    let mut context = ctx();
    context.set("items", Value::from(vec![1, 2]));
    let node_id = NodeId::new();
    let mut config = Map::new();
    config.insert("collection".into(), Value::from("items"));
    config.insert("item_var".into(), Value::from("current"));

    let first = ForEachNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(first.fired_ports(), vec!["body".to_string()]);
    assert_eq!(context.get("current", None), Value::from(1));

    let second = ForEachNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(second.fired_ports(), vec!["body".to_string()]);
    assert_eq!(context.get("current", None), Value::from(2));

    let third = ForEachNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(third.fired_ports(), vec![crate::ports::EXEC_OUT.to_string()]);
}

#[test]
fn try_node_two_phase_entry_success_path() {
    let mut context = ctx();
    let node_id = NodeId::new();
    let config = Map::new();

    let first = TryNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(first.fired_ports(), vec!["try_body".to_string()]);

    // Re-entry without a recorded error routes to "success".
    let second = TryNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(second.fired_ports(), vec!["success".to_string()]);
}

#[test]
fn try_node_routes_to_catch_when_error_recorded() {
    let mut context = ctx();
    let node_id = NodeId::new();
    let config = Map::new();

    TryNode.execute(&mut context, node_id, &config, &empty_inputs());
    let mut scope: TryScope = serde_json::from_value(context.scope(node_id)).unwrap();
    scope.error = Some("boom".into());
    context.set_scope(node_id, serde_json::to_value(&scope).unwrap());

    let result = TryNode.execute(&mut context, node_id, &config, &empty_inputs());
    assert_eq!(result.fired_ports(), vec!["catch".to_string()]);
    assert_eq!(context.get("error", None), Value::from("boom"));
}

#[test]
fn assert_node_fails_when_not_truthy() {
    let mut context = ctx();
    context.set("ok", Value::from(false));
    let mut config = Map::new();
    config.insert("variable".into(), Value::from("ok"));

    let result = AssertNode.execute(&mut context, NodeId::new(), &config, &empty_inputs());
    assert!(!result.success);
    assert_eq!(result.error_type.as_deref(), Some("Validation"));
}

#[test]
fn throw_error_node_always_fails() {
    let mut context = ctx();
    let mut config = Map::new();
    config.insert("message".into(), Value::from("nope"));
    let result = ThrowErrorNode.execute(&mut context, NodeId::new(), &config, &empty_inputs());
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("nope"));
}

#[test]
fn registering_builtin_nodes_populates_registry() {
    let mut registry = crate::node::NodeRegistry::new();
    register_builtin_nodes(&mut registry);
    for node_type in [
        "core.start",
        "core.end",
        "core.set_variable",
        "core.read_variable",
        "core.increment_variable",
        "core.if",
        "core.while",
        "core.for_each",
        "core.loop_continue",
        "core.loop_break",
        "core.try",
        "core.try_end",
        "core.on_error",
        "core.retry",
        "core.retry_success",
        "core.retry_fail",
        "core.throw_error",
        "core.assert",
        "core.subflow_invoke",
        "core.regular",
    ] {
        assert!(registry.is_registered(node_type), "{node_type} should be registered");
    }
}
