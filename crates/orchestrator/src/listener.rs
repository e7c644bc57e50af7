// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! TCP accept loop for robot sessions (spec §6.1). Grounded on the
//! teacher's `listener/mod.rs` accept-loop/per-connection-task structure,
//! simplified to TCP-only: this protocol has no local-socket counterpart
//! to the teacher's CLI-over-Unix-socket design.
//!
//! Each accepted connection gets its own task (spec §5: "session
//! send/receive runs on a per-session task"); the task owns the read half
//! and forwards parsed [`RobotMessage`]s into the shared [`RobotManager`].
//! The write half is wrapped in [`TcpSessionHandle`] behind an async
//! mutex so the manager can send a `job_assign` from whatever task calls
//! `try_assign_job`, concurrently with this task's own `welcome` send.

use async_trait::async_trait;
use casare_core::{Clock, RobotId, SessionId, SystemClock};
use casare_wire::{read_message, write_message, FramingError, RobotMessage, ServerMessage};
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;

use crate::job::Job;
use crate::robot_manager::{RobotManager, RobotManagerConfig, RobotRegistration, SessionHandle, SessionSendError};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

struct TcpSessionHandle {
    writer: AsyncMutex<OwnedWriteHalf>,
}

impl TcpSessionHandle {
    async fn send(&self, msg: &ServerMessage) -> Result<(), SessionSendError> {
        let payload = serde_json::to_vec(msg).map_err(|e| SessionSendError::Io(e.to_string()))?;
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, &payload).await.map_err(to_send_error)
    }
}

fn to_send_error(e: FramingError) -> SessionSendError {
    match e {
        FramingError::Io(io) => SessionSendError::Io(io.to_string()),
        FramingError::TooLarge(n) => SessionSendError::Io(format!("payload too large: {n} bytes")),
    }
}

#[async_trait]
impl SessionHandle for TcpSessionHandle {
    async fn send_job_assign(&self, job: &Job) -> Result<(), SessionSendError> {
        let msg = ServerMessage::JobAssign {
            ts: SystemClock.epoch_ms(),
            job_id: job.job_id,
            workflow_id: job.workflow_id,
            workflow_data: job.workflow_data.clone(),
            variables: job.variables.clone(),
            timeout_ms: job.timeout_ms,
        };
        self.send(&msg).await
    }
}

/// Accepts robot connections on a TCP socket and wires each one into a
/// shared [`RobotManager`].
pub struct Listener {
    tcp: TcpListener,
    manager: Arc<RobotManager>,
}

impl Listener {
    pub async fn bind(bind_addr: &str, manager: Arc<RobotManager>) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(bind_addr).await?;
        Ok(Self { tcp, manager })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.tcp.local_addr()
    }

    /// Runs the accept loop until `shutdown` resolves.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.tcp.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let manager = self.manager.clone();
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(stream, manager).await {
                                    tracing::warn!(%peer, error = %err, "robot session ended with an error");
                                }
                            });
                        }
                        Err(err) => tracing::warn!(error = %err, "accept failed"),
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("listener shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, manager: Arc<RobotManager>) -> Result<(), FramingError> {
    let (mut read_half, write_half) = stream.into_split();
    let session = Arc::new(TcpSessionHandle { writer: AsyncMutex::new(write_half) });

    let frame = read_message(&mut read_half).await?;
    let msg: RobotMessage = serde_json::from_slice(&frame).unwrap_or(RobotMessage::Unknown);
    let RobotMessage::Register { robot_id, robot_name, hostname, environment, tenant_id, capabilities, .. } = msg else {
        tracing::warn!("connection's first frame was not a register message, dropping");
        return Ok(());
    };
    let Some(tenant_id) = tenant_id else {
        tracing::warn!(%robot_id, "registration rejected: tenant_id is required");
        return Ok(());
    };

    let session_id = SessionId::new();
    let registration = RobotRegistration {
        robot_id,
        session_id,
        robot_name,
        hostname,
        environment,
        tenant_id,
        capability_types: capabilities.types,
        max_concurrent_jobs: capabilities.max_concurrent_jobs,
    };
    manager.register_robot(session.clone(), registration).await;

    let welcome = ServerMessage::Welcome { ts: SystemClock.epoch_ms(), server_version: SERVER_VERSION.to_string(), session_id: session_id.to_string() };
    if session.send(&welcome).await.is_err() {
        manager.unregister_robot(robot_id, "welcome_send_failed").await;
        return Ok(());
    }

    loop {
        let frame = match read_message(&mut read_half).await {
            Ok(frame) => frame,
            Err(_) => break,
        };
        let msg: RobotMessage = serde_json::from_slice(&frame).unwrap_or(RobotMessage::Unknown);
        match msg {
            RobotMessage::Register { .. } => {
                tracing::warn!(%robot_id, "ignoring re-register on an already-registered session");
            }
            RobotMessage::Heartbeat { metrics, .. } => {
                manager.update_heartbeat(robot_id, metrics).await;
            }
            RobotMessage::JobAccept { .. } => {}
            RobotMessage::JobReject { job_id, reason, .. } => {
                manager.requeue_job(robot_id, job_id, &reason).await;
            }
            RobotMessage::JobComplete { job_id, success, result, .. } => {
                manager.job_completed(robot_id, job_id, success, result).await;
            }
            RobotMessage::Log { job_id, level, message, .. } => {
                tracing::info!(%robot_id, ?job_id, level, message, "robot log");
            }
            RobotMessage::Unknown => {
                tracing::debug!(%robot_id, "ignoring unrecognized message type");
            }
        }
    }

    manager.unregister_robot(robot_id, "connection_closed").await;
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
