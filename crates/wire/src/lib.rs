// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! casare-wire: the orchestrator <-> robot session protocol (spec §6.1).
//!
//! Wire format: 4-byte big-endian length prefix + JSON payload, mirroring
//! the teacher's IPC framing (`oj-wire`).

mod admin;
mod framing;
mod messages;

pub use admin::{AdminRequest, AdminResponse, AuditQueryRequest, RobotSummary, SubmitJobRequest};
pub use framing::{read_message, write_message, FramingError};
pub use messages::{Metrics, RegisterCapabilities, RobotMessage, ServerMessage};
