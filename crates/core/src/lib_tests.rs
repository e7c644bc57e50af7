// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;

#[test]
fn node_id_has_expected_prefix() {
    let id = NodeId::new();
    assert!(id.as_str().starts_with("nod-"));
}

#[test]
fn job_id_is_uuid_v4() {
    let id = JobId::new();
    assert_eq!(id.0.get_version_num(), 4);
}

#[test]
fn job_id_roundtrips_through_display_and_parse() {
    let id = JobId::new();
    let parsed = JobId::from_string(id.to_string()).expect("valid uuid");
    assert_eq!(id, parsed);
}

#[test]
fn job_id_rejects_garbage() {
    assert!(JobId::from_string("not-a-uuid").is_err());
}

#[test]
fn checkpoint_id_is_eight_chars() {
    let id = CheckpointId::new();
    assert_eq!(id.0.len(), 8);
}

#[test]
fn checkpoint_ids_are_unique() {
    let a = CheckpointId::new();
    let b = CheckpointId::new();
    assert_ne!(a, b);
}

#[yare::parameterized(
    robot = { RobotId::new().as_str().to_string(), "rbt-" },
    tenant = { TenantId::new().as_str().to_string(), "tnt-" },
    workflow = { WorkflowId::new().as_str().to_string(), "wfl-" },
    session = { SessionId::new().as_str().to_string(), "ses-" },
)]
fn id_types_carry_their_prefix(id: String, prefix: &str) {
    assert!(id.starts_with(prefix), "{id} should start with {prefix}");
}
