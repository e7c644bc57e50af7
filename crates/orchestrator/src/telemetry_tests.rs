// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;

#[test]
fn noop_exporter_is_the_default_and_does_nothing_observable() {
    let telemetry = Telemetry::default();
    telemetry.record_error(ErrorKind::Transient, "test");
    telemetry.record_job_assigned();
    telemetry.record_job_completed(true);
}

#[test]
fn counting_exporter_tallies_errors_and_job_outcomes() {
    let exporter = Arc::new(CountingExporter::default());
    let telemetry = Telemetry::new(exporter.clone());

    telemetry.record_error(ErrorKind::Timeout, "robot_manager");
    telemetry.record_job_assigned();
    telemetry.record_job_assigned();
    telemetry.record_job_completed(true);
    telemetry.record_job_completed(false);

    let snapshot = exporter.snapshot();
    assert_eq!(snapshot.errors_recorded, 1);
    assert_eq!(snapshot.jobs_assigned, 2);
    assert_eq!(snapshot.jobs_completed, 1);
    assert_eq!(snapshot.jobs_failed, 1);
}
