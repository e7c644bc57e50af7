// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use tempfile::tempdir;

fn event(event_type: &str, ts: u64) -> AuditEvent {
    AuditEvent::new(event_type, ts)
}

#[test]
fn new_event_carries_a_parseable_utc_iso_timestamp() {
    let e = event("robot_registered", 1_700_000_000_000);
    let parsed: chrono::DateTime<chrono::Utc> = e.timestamp_iso.parse().unwrap();
    assert_eq!(parsed.timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn log_event_chains_to_genesis_for_the_first_event() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    let id = repo.log_event(event("robot_registered", 1)).unwrap();

    let logged = repo.get_by_id(&id).unwrap();
    let expected = hash_chain(GENESIS, &logged.event_id, &logged.timestamp_iso, &logged.event_type);
    assert_eq!(logged.hash_chain, expected);
}

#[test]
fn consecutive_events_chain_to_their_predecessor() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    let first_id = repo.log_event(event("job_submitted", 1)).unwrap();
    let second_id = repo.log_event(event("job_completed", 2)).unwrap();

    let first = repo.get_by_id(&first_id).unwrap();
    let second = repo.get_by_id(&second_id).unwrap();
    let expected = hash_chain(&first.hash_chain, &second.event_id, &second.timestamp_iso, &second.event_type);
    assert_eq!(second.hash_chain, expected);
}

#[test]
fn verify_integrity_passes_on_an_untampered_log() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    for i in 0..5 {
        repo.log_event(event("job_submitted", i)).unwrap();
    }

    let report = repo.verify_integrity(1000);
    assert!(report.valid);
    assert_eq!(report.events_checked, 5);
    assert!(report.first_invalid_id.is_none());
}

#[test]
fn verify_integrity_detects_a_tampered_hash() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    repo.log_event(event("job_submitted", 1)).unwrap();
    repo.log_event(event("job_completed", 2)).unwrap();

    repo.events.lock()[0].hash_chain = "tampered".into();

    let report = repo.verify_integrity(1000);
    assert!(!report.valid);
    assert!(report.first_invalid_id.is_some());
}

#[test]
fn query_filters_by_event_type_and_success() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    let mut failed = event("job_failed", 1);
    failed.success = false;
    repo.log_event(failed).unwrap();
    repo.log_event(event("job_completed", 2)).unwrap();

    let results = repo.query(&AuditQuery { success: Some(false), ..Default::default() });
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].event_type, "job_failed");
}

#[test]
fn query_orders_newest_first_and_respects_limit() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    for i in 0..3 {
        repo.log_event(event("tick", i)).unwrap();
    }

    let results = repo.query(&AuditQuery { limit: 2, ..Default::default() });
    assert_eq!(results.len(), 2);
    assert!(results[0].timestamp_ms > results[1].timestamp_ms);
}

#[test]
fn cleanup_old_events_removes_events_past_the_retention_window() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    let day_ms = 24 * 60 * 60 * 1000u64;
    repo.log_event(event("old", 0)).unwrap();
    repo.log_event(event("recent", 10 * day_ms)).unwrap();

    let report = repo.cleanup_old_events(5, 10 * day_ms).unwrap();
    assert_eq!(report.events_deleted, 1);
    assert_eq!(repo.query(&AuditQuery::default()).len(), 1);
}

#[test]
fn cleanup_survives_a_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.wal");
    let day_ms = 24 * 60 * 60 * 1000u64;
    {
        let repo = FileAuditRepository::open(&path).unwrap();
        repo.log_event(event("old", 0)).unwrap();
        repo.log_event(event("recent", 10 * day_ms)).unwrap();
        repo.cleanup_old_events(5, 10 * day_ms).unwrap();
    }

    let repo = FileAuditRepository::open(&path).unwrap();
    assert_eq!(repo.query(&AuditQuery::default()).len(), 1);
}

#[test]
fn export_to_json_writes_every_event() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    repo.log_event(event("job_submitted", 1)).unwrap();
    repo.log_event(event("job_completed", 2)).unwrap();

    let out_path = dir.path().join("export.json");
    let count = repo.export_to_json(&out_path).unwrap();
    assert_eq!(count, 2);

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed["event_count"], 2);
}

#[test]
fn export_to_csv_writes_a_header_and_one_row_per_event() {
    let dir = tempdir().unwrap();
    let repo = FileAuditRepository::open(dir.path().join("audit.wal")).unwrap();
    repo.log_event(event("job_submitted", 1)).unwrap();

    let out_path = dir.path().join("export.csv");
    repo.export_to_csv(&out_path).unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("event_id,event_type"));
}

#[test]
fn reopening_an_untouched_log_still_verifies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.wal");
    {
        let repo = FileAuditRepository::open(&path).unwrap();
        repo.log_event(event("a", 1)).unwrap();
        repo.log_event(event("b", 2)).unwrap();
    }

    let repo = FileAuditRepository::open(&path).unwrap();
    assert!(repo.verify_integrity(1000).valid);
}
