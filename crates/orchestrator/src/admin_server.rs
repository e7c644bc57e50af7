// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Admin/operator-CLI server (spec §6.5): a short-lived request/response
//! TCP listener, separate from the long-lived robot session listener,
//! since an admin connection issues one request and closes rather than
//! streaming. Shares [`casare_wire`]'s framing with the robot protocol.

use casare_core::repository::{Robot, RobotStatus};
use casare_storage::{AuditQuery, FileAuditRepository};
use casare_wire::{read_message, write_message, AdminRequest, AdminResponse, AuditQueryRequest, RobotSummary, SubmitJobRequest};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::job::JobSpec;
use crate::robot_manager::RobotManager;

/// Serves [`AdminRequest`]s against a shared [`RobotManager`] and an
/// optional audit log (queries fail gracefully with an error response when
/// no audit log is configured).
pub struct AdminServer {
    tcp: TcpListener,
    manager: Arc<RobotManager>,
    audit: Option<Arc<FileAuditRepository>>,
}

impl AdminServer {
    pub async fn bind(bind_addr: &str, manager: Arc<RobotManager>, audit: Option<Arc<FileAuditRepository>>) -> std::io::Result<Self> {
        let tcp = TcpListener::bind(bind_addr).await?;
        Ok(Self { tcp, manager, audit })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.tcp.local_addr()
    }

    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.tcp.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let manager = self.manager.clone();
                            let audit = self.audit.clone();
                            tokio::spawn(async move {
                                if let Err(err) = handle_request(stream, manager, audit).await {
                                    tracing::warn!(%peer, error = %err, "admin request failed");
                                }
                            });
                        }
                        Err(err) => tracing::warn!(error = %err, "admin accept failed"),
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("admin server shutting down");
                    return;
                }
            }
        }
    }
}

async fn handle_request(
    mut stream: TcpStream,
    manager: Arc<RobotManager>,
    audit: Option<Arc<FileAuditRepository>>,
) -> Result<(), casare_wire::FramingError> {
    let frame = read_message(&mut stream).await?;
    let request: AdminRequest = match serde_json::from_slice(&frame) {
        Ok(request) => request,
        Err(err) => {
            return reply(&mut stream, &AdminResponse::Error { message: format!("malformed request: {err}") }).await;
        }
    };

    let response = match request {
        AdminRequest::SubmitJob(submit) => submit_job(&manager, submit).await,
        AdminRequest::ListRobots => AdminResponse::Robots { robots: manager.list_robot_snapshots().iter().map(to_summary).collect() },
        AdminRequest::QueryAudit(query) => query_audit(audit.as_deref(), query),
    };

    reply(&mut stream, &response).await
}

async fn reply(stream: &mut TcpStream, response: &AdminResponse) -> Result<(), casare_wire::FramingError> {
    let payload = serde_json::to_vec(response).expect("AdminResponse always serializes");
    write_message(stream, &payload).await
}

async fn submit_job(manager: &RobotManager, submit: SubmitJobRequest) -> AdminResponse {
    let spec = JobSpec {
        workflow_id: submit.workflow_id,
        workflow_data: submit.workflow_data,
        variables: submit.variables,
        priority: submit.priority,
        target_robot_id: submit.target_robot_id,
        required_capabilities: submit.required_capabilities,
        timeout_ms: submit.timeout_ms.unwrap_or_else(|| crate::env::default_job_timeout().as_millis() as u64),
        tenant_id: submit.tenant_id,
    };
    let job = manager.submit_job(spec).await;
    AdminResponse::JobSubmitted { job_id: job.job_id, status: format!("{:?}", job.status).to_lowercase() }
}

fn query_audit(audit: Option<&FileAuditRepository>, query: AuditQueryRequest) -> AdminResponse {
    let Some(audit) = audit else {
        return AdminResponse::Error { message: "audit log is not configured on this orchestrator".to_string() };
    };
    let q = AuditQuery {
        event_type: query.event_type,
        resource: query.resource,
        workflow_id: query.workflow_id,
        robot_id: query.robot_id,
        ..Default::default()
    };
    let mut events: Vec<serde_json::Value> = audit.query(&q).into_iter().map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null)).collect();
    if let Some(offset) = query.offset {
        events = events.into_iter().skip(offset).collect();
    }
    if let Some(limit) = query.limit {
        events.truncate(limit);
    }
    AdminResponse::AuditEvents { events }
}

fn to_summary(robot: &Robot) -> RobotSummary {
    let status = match robot.status {
        RobotStatus::Offline => "offline",
        RobotStatus::Idle => "idle",
        RobotStatus::Busy => "busy",
        RobotStatus::Draining => "draining",
    };
    RobotSummary {
        robot_id: robot.robot_id,
        tenant_id: robot.tenant_id,
        name: robot.name.clone(),
        status: status.to_string(),
        current_job_count: robot.current_job_count,
        max_concurrent_jobs: robot.max_concurrent_jobs,
    }
}

#[cfg(test)]
#[path = "admin_server_tests.rs"]
mod tests;
