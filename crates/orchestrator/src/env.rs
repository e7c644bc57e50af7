// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Centralized environment variable access for the orchestrator binary
//! (spec §6.5: "Core reads: orchestrator bind address, heartbeat timeout
//! seconds, default job timeout, default checkpoint interval").

use std::path::PathBuf;
use std::time::Duration;

/// TCP bind address for robot sessions. `CASARE_BIND_ADDR`, default
/// `0.0.0.0:7600`.
pub fn bind_addr() -> String {
    std::env::var("CASARE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:7600".to_string())
}

/// TCP bind address for the operator-CLI admin server. `CASARE_ADMIN_BIND_ADDR`,
/// default `127.0.0.1:7601`.
pub fn admin_bind_addr() -> String {
    std::env::var("CASARE_ADMIN_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:7601".to_string())
}

/// How long a robot may go without a heartbeat before being unregistered
/// with reason `heartbeat_lost`. `CASARE_HEARTBEAT_TIMEOUT_SECS`, default 30s.
pub fn heartbeat_timeout() -> Duration {
    std::env::var("CASARE_HEARTBEAT_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30))
}

/// Default job timeout applied when a submitted job omits one.
/// `CASARE_DEFAULT_JOB_TIMEOUT_MS`, default 5 minutes.
pub fn default_job_timeout() -> Duration {
    std::env::var("CASARE_DEFAULT_JOB_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(300))
}

/// Default checkpoint interval (nodes visited between auto-saves), passed
/// through to `CheckpointManager::with_interval`. `CASARE_CHECKPOINT_INTERVAL`.
pub fn default_checkpoint_interval() -> usize {
    std::env::var("CASARE_CHECKPOINT_INTERVAL").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(10)
}

/// How often the heartbeat-sweep timer runs. `CASARE_HEARTBEAT_SWEEP_MS`,
/// default 5s.
pub fn heartbeat_sweep_interval() -> Duration {
    std::env::var("CASARE_HEARTBEAT_SWEEP_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Directory holding the audit WAL and offline-queue state.
/// `CASARE_STATE_DIR` > `XDG_STATE_HOME/casare` > `~/.local/state/casare`.
pub fn state_dir() -> Result<PathBuf, std::env::VarError> {
    if let Ok(dir) = std::env::var("CASARE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("casare"));
    }
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".local/state/casare"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
