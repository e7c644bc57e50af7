// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use casare_core::error::{Classify, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("workflow error: {0}")]
    Workflow(#[from] casare_core::WorkflowError),
    #[error("unknown node type: {0}")]
    UnknownNodeType(#[from] casare_core::UnknownNodeType),
    #[error("subflow {0} exceeds the maximum nesting depth")]
    SubflowTooDeep(String),
    #[error("subflow {0} could not be loaded: {1}")]
    SubflowLoad(String, String),
    #[error("offline queue error: {0}")]
    OfflineQueue(#[from] casare_core::offline_queue::OfflineQueueError),
}

impl Classify for RunnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::Workflow(e) => e.kind(),
            RunnerError::UnknownNodeType(_) => ErrorKind::Validation,
            RunnerError::SubflowTooDeep(_) => ErrorKind::Fatal,
            RunnerError::SubflowLoad(_, _) => ErrorKind::Validation,
            RunnerError::OfflineQueue(e) => e.kind(),
        }
    }
}
