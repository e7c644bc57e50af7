// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Top-level orchestrator error type (spec §7).

use casare_core::error::{Classify, ErrorKind};
use casare_core::repository::RepositoryError;
use casare_resilience::breaker::CircuitOpen;
use casare_storage::audit::AuditError;
use casare_wire::FramingError;

use crate::robot_manager::SessionSendError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionSendError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),
    #[error("config invalid: {0}")]
    Config(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Classify for OrchestratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) => ErrorKind::Validation,
            OrchestratorError::Repository(e) => e.kind(),
            OrchestratorError::Session(e) => e.kind(),
            OrchestratorError::Audit(e) => e.kind(),
            OrchestratorError::Framing(e) => e.kind(),
            OrchestratorError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            OrchestratorError::Config(_) => ErrorKind::Validation,
            OrchestratorError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}
