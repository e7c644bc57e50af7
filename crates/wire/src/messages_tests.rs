// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use casare_core::{JobId, RobotId};

#[test]
fn register_message_roundtrips_through_json() {
    let msg = RobotMessage::Register {
        ts: 1,
        robot_id: RobotId::from("robot-01"),
        robot_name: "robot-01".into(),
        hostname: "host-a".into(),
        environment: "prod".into(),
        tenant_id: None,
        capabilities: RegisterCapabilities { types: vec!["http".into()], max_concurrent_jobs: 4 },
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert_eq!(json.contains("\"type\":\"register\""), true);

    let back: RobotMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
    assert_eq!(back.type_name(), "register");
}

#[test]
fn job_complete_carries_optional_result() {
    let msg = RobotMessage::JobComplete {
        ts: 2,
        job_id: JobId::new(),
        success: true,
        result: Some(serde_json::json!({"ok": true})),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: RobotMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn unrecognized_robot_message_type_deserializes_to_unknown() {
    let json = r#"{"type":"something_future","ts":1,"foo":"bar"}"#;
    let msg: RobotMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg, RobotMessage::Unknown);
    assert_eq!(msg.type_name(), "unknown");
}

#[test]
fn job_assign_roundtrips_and_type_tag_is_snake_case() {
    let msg = ServerMessage::JobAssign {
        ts: 5,
        job_id: JobId::new(),
        workflow_id: casare_core::WorkflowId::from("wf-1"),
        workflow_data: serde_json::json!({"nodes": []}),
        variables: serde_json::json!({}),
        timeout_ms: 30_000,
    };
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"type\":\"job_assign\""));
    let back: ServerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn unrecognized_server_message_type_deserializes_to_unknown() {
    let json = r#"{"type":"new_fancy_thing","ts":1}"#;
    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg, ServerMessage::Unknown);
}

#[test]
fn shutdown_message_roundtrips() {
    let msg = ServerMessage::Shutdown { ts: 9, reason: "maintenance".into() };
    let json = serde_json::to_string(&msg).unwrap();
    let back: ServerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}
