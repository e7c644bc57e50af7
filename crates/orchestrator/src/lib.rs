// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! casare-orchestrator: the fleet side of CasareRPA — robot registration,
//! job assignment, and the admin/audit surface (spec §4.9–§4.10).

pub mod admin_server;
pub mod env;
pub mod error;
pub mod job;
pub mod listener;
pub mod robot_manager;
pub mod telemetry;

pub use admin_server::AdminServer;
pub use error::OrchestratorError;
pub use job::{Job, JobSpec, JobStatus};
pub use robot_manager::{AdminEvent, AdminSessionHandle, RobotManager, RobotManagerConfig, RobotRegistration, SessionHandle, SessionSendError};
pub use telemetry::{CountingExporter, NoopExporter, Telemetry, TelemetryExporter};
