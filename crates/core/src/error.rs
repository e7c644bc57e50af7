// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Shared error-kind taxonomy (spec §7).
//!
//! Every fallible operation in the workspace classifies its failure into one
//! of these kinds so that retry policies (`casare-resilience`) and telemetry
//! can reason about recoverability without downcasting concrete error types.

use serde::{Deserialize, Serialize};

/// A contract, not a concrete error type: what a caller may do about a
/// failure, independent of which crate or operation produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input. Surfaced to the caller, never retried.
    Validation,
    /// A bounded wait elapsed. Retried by an enclosing Retry node; otherwise surfaced.
    Timeout,
    /// Short-circuited by an open circuit breaker.
    CircuitOpen,
    /// Network/IO hiccup. The default retry policy applies.
    Transient,
    /// Missing entity.
    NotFound,
    /// Concurrent mutation. One retry, then surface.
    Conflict,
    /// Invariant violation. Terminates the enclosing run.
    Fatal,
}

impl ErrorKind {
    /// Whether the default retry policy should retry an error of this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Transient | ErrorKind::Conflict)
    }

    /// Whether this kind allows at most one retry (as opposed to the full policy).
    pub fn is_single_retry(&self) -> bool {
        matches!(self, ErrorKind::Conflict)
    }
}

crate::simple_display! {
    ErrorKind {
        Validation => "validation",
        Timeout => "timeout",
        CircuitOpen => "circuit_open",
        Transient => "transient",
        NotFound => "not_found",
        Conflict => "conflict",
        Fatal => "fatal",
    }
}

/// Any type whose failures classify into an [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Generic core-crate error. Leaf modules mostly define their own
/// `thiserror` enums and implement [`Classify`] directly; this is the
/// catch-all used where a module doesn't need its own variant set.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Classify for CoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
