// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! `casare`: operator CLI for submitting jobs, listing connected robots,
//! and inspecting the audit log against a running `casared` (spec §6.5).

use anyhow::{Context, Result};
use casare_wire::{read_message, write_message, AdminRequest, AdminResponse, AuditQueryRequest, SubmitJobRequest};
use clap::{Parser, Subcommand};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(
    name = "casare",
    about = "Operator CLI for a CasareRPA orchestrator",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"))
)]
struct Cli {
    /// Orchestrator admin address (host:port).
    #[arg(long, env = "CASARE_ADMIN_BIND_ADDR", default_value = "127.0.0.1:7601")]
    admin_addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a workflow as a job.
    Submit {
        workflow_id: String,
        /// Path to a JSON file containing the workflow's node graph.
        #[arg(long)]
        workflow_file: std::path::PathBuf,
        #[arg(long)]
        tenant_id: Option<String>,
        #[arg(long)]
        target_robot_id: Option<String>,
    },
    /// List connected robots.
    Robots,
    /// Query the orchestrator's audit log.
    Audit {
        #[arg(long)]
        event_type: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = match cli.command {
        Command::Submit { workflow_id, workflow_file, tenant_id, target_robot_id } => {
            let workflow_data = std::fs::read_to_string(&workflow_file)
                .with_context(|| format!("reading {}", workflow_file.display()))?;
            let workflow_data: serde_json::Value = serde_json::from_str(&workflow_data)?;
            AdminRequest::SubmitJob(SubmitJobRequest {
                workflow_id: workflow_id.into(),
                workflow_data,
                variables: serde_json::Value::Null,
                priority: 5,
                target_robot_id: target_robot_id.map(Into::into),
                required_capabilities: Vec::new(),
                timeout_ms: None,
                tenant_id: tenant_id.map(Into::into),
            })
        }
        Command::Robots => AdminRequest::ListRobots,
        Command::Audit { event_type, limit } => AdminRequest::QueryAudit(AuditQueryRequest {
            event_type,
            resource: None,
            workflow_id: None,
            robot_id: None,
            limit,
            offset: None,
        }),
    };

    let response = send(&cli.admin_addr, &request).await?;
    print_response(response);
    Ok(())
}

async fn send(addr: &str, request: &AdminRequest) -> Result<AdminResponse> {
    let mut stream = TcpStream::connect(addr).await.with_context(|| format!("connecting to {addr}"))?;
    let payload = serde_json::to_vec(request)?;
    write_message(&mut stream, &payload).await.context("sending request")?;
    let frame = read_message(&mut stream).await.context("reading response")?;
    Ok(serde_json::from_slice(&frame)?)
}

fn print_response(response: AdminResponse) {
    match response {
        AdminResponse::JobSubmitted { job_id, status } => println!("job {job_id} submitted ({status})"),
        AdminResponse::Robots { robots } => {
            for robot in robots {
                println!("{}\t{}\t{}/{}\t{}", robot.robot_id, robot.status, robot.current_job_count, robot.max_concurrent_jobs, robot.name);
            }
        }
        AdminResponse::AuditEvents { events } => {
            for event in events {
                println!("{event}");
            }
        }
        AdminResponse::Error { message } => {
            eprintln!("error: {message}");
            std::process::exit(1);
        }
    }
}
