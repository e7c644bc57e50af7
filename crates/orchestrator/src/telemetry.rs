// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Telemetry facade (spec §7: "All failures route to one callback-set per
//! process for observability; telemetry records error.type, error.component,
//! error.recoverable"). Thin wrapper over `tracing` spans plus an optional
//! [`TelemetryExporter`] for callers who want process-wide counters (a
//! metrics backend, a test probe) without the rest of the crate depending
//! on one directly.

use casare_core::error::ErrorKind;
use parking_lot::Mutex;
use std::sync::Arc;

/// Sink for classified failures. The default [`NoopExporter`] just relies
/// on the `tracing::error!` call already emitted alongside it.
pub trait TelemetryExporter: Send + Sync {
    fn record_error(&self, error_type: ErrorKind, component: &str, recoverable: bool);
    fn record_job_assigned(&self) {}
    fn record_job_completed(&self, success: bool) {
        let _ = success;
    }
}

pub struct NoopExporter;

impl TelemetryExporter for NoopExporter {
    fn record_error(&self, _error_type: ErrorKind, _component: &str, _recoverable: bool) {}
}

/// In-process counters, handy in tests and as a starting point for a real
/// exporter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub errors_recorded: u64,
    pub jobs_assigned: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
}

#[derive(Default)]
pub struct CountingExporter {
    snapshot: Mutex<TelemetrySnapshot>,
}

impl CountingExporter {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.snapshot.lock()
    }
}

impl TelemetryExporter for CountingExporter {
    fn record_error(&self, _error_type: ErrorKind, _component: &str, _recoverable: bool) {
        self.snapshot.lock().errors_recorded += 1;
    }

    fn record_job_assigned(&self) {
        self.snapshot.lock().jobs_assigned += 1;
    }

    fn record_job_completed(&self, success: bool) {
        let mut snapshot = self.snapshot.lock();
        if success {
            snapshot.jobs_completed += 1;
        } else {
            snapshot.jobs_failed += 1;
        }
    }
}

/// Process-wide telemetry handle, built once by the composition root and
/// cloned (cheaply, via the inner `Arc`) into every component that reports
/// through it.
#[derive(Clone)]
pub struct Telemetry {
    exporter: Arc<dyn TelemetryExporter>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Arc::new(NoopExporter))
    }
}

impl Telemetry {
    pub fn new(exporter: Arc<dyn TelemetryExporter>) -> Self {
        Self { exporter }
    }

    /// Classifies and records a failure, per spec §7's observability
    /// callback: `error.type`, `error.component`, `error.recoverable`.
    pub fn record_error(&self, error_type: ErrorKind, component: &str) {
        let recoverable = error_type.is_retryable();
        tracing::error!(error.r#type = %error_type, error.component = component, error.recoverable = recoverable, "operation failed");
        self.exporter.record_error(error_type, component, recoverable);
    }

    pub fn record_job_assigned(&self) {
        self.exporter.record_job_assigned();
    }

    pub fn record_job_completed(&self, success: bool) {
        self.exporter.record_job_completed(success);
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
