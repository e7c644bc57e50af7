// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! `casared`: the orchestrator binary. Wires the robot manager, the TCP
//! listener, and the heartbeat-sweep timer together, then runs until
//! `SIGINT`/`SIGTERM` (spec §6.5).

use casare_core::EventBus;
use casare_orchestrator::{env, listener::Listener, AdminServer, RobotManager, RobotManagerConfig};
use casare_resilience::breaker::{BreakerConfig, CircuitBreakerRegistry};
use casare_storage::{FileAuditRepository, InMemoryRobotRepository};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;

const EXIT_CLEAN: u8 = 0;
const EXIT_FATAL_INIT: u8 = 1;
const EXIT_CONFIG_INVALID: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let bind_addr = env::bind_addr();
    let admin_bind_addr = env::admin_bind_addr();
    if bind_addr.parse::<std::net::SocketAddr>().is_err() || admin_bind_addr.parse::<std::net::SocketAddr>().is_err() {
        tracing::error!(%bind_addr, %admin_bind_addr, "bind address is not a valid socket address");
        return ExitCode::from(EXIT_CONFIG_INVALID);
    }

    let state_dir = match env::state_dir() {
        Ok(dir) => dir,
        Err(err) => {
            tracing::error!(error = %err, "failed to resolve state directory");
            return ExitCode::from(EXIT_CONFIG_INVALID);
        }
    };
    if let Err(err) = std::fs::create_dir_all(&state_dir) {
        tracing::error!(dir = %state_dir.display(), error = %err, "failed to create state directory");
        return ExitCode::from(EXIT_FATAL_INIT);
    }
    let audit = match FileAuditRepository::open(state_dir.join("audit.wal")) {
        Ok(audit) => Some(Arc::new(audit)),
        Err(err) => {
            tracing::error!(error = %err, "failed to open audit log");
            return ExitCode::from(EXIT_FATAL_INIT);
        }
    };

    let config = RobotManagerConfig { heartbeat_timeout_ms: env::heartbeat_timeout().as_millis() as u64 };
    let breakers = Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default()));
    let manager = Arc::new(
        RobotManager::new(EventBus::new(), breakers, config).with_repository(Arc::new(InMemoryRobotRepository::new())),
    );

    let listener = match Listener::bind(&bind_addr, manager.clone()).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%bind_addr, error = %err, "failed to bind orchestrator listener");
            return ExitCode::from(EXIT_FATAL_INIT);
        }
    };
    tracing::info!(addr = %bind_addr, "casared listening for robot connections");

    let admin_server = match AdminServer::bind(&admin_bind_addr, manager.clone(), audit).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(addr = %admin_bind_addr, error = %err, "failed to bind admin server");
            return ExitCode::from(EXIT_FATAL_INIT);
        }
    };
    tracing::info!(addr = %admin_bind_addr, "casared listening for admin connections");

    let sweep_manager = manager.clone();
    let sweep_interval = env::heartbeat_sweep_interval();
    let sweep_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweep_manager.sweep_stale_heartbeats().await;
        }
    });

    let shutdown = Arc::new(Notify::new());
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        signal_shutdown.notify_waiters();
    });

    let robot_shutdown = shutdown.clone();
    let admin_shutdown = shutdown.clone();
    tokio::join!(listener.run(async move { robot_shutdown.notified().await }), admin_server.run(async move { admin_shutdown.notified().await }));
    sweep_task.abort();

    ExitCode::from(EXIT_CLEAN)
}
