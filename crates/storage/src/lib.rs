// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! casare-storage: concrete persistence for the robot-side offline queue
//! (C9), the orchestrator's tamper-evident audit log (C11), and in-memory
//! reference implementations of the robot/tenant repositories (C12/C13).
//!
//! Durability is WAL-based throughout, grounded on the teacher's
//! `oj-storage` write-ahead log: one append-only file, one record per line,
//! `fsync`'d per write, replayed into an in-memory index on open.

mod wal;

pub mod audit;
pub mod offline_queue;
pub mod repository;

pub use audit::{AuditEvent, AuditQuery, FileAuditRepository};
pub use offline_queue::FileOfflineQueue;
pub use repository::{InMemoryRobotRepository, InMemoryTenantRepository};
