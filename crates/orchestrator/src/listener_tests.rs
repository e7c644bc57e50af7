// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use casare_core::{EventBus, RobotId, TenantId};
use casare_resilience::breaker::{BreakerConfig, CircuitBreakerRegistry};
use casare_wire::{RegisterCapabilities, RobotMessage};
use std::future::pending;
use std::time::Duration;
use tokio::net::TcpStream;

fn manager() -> Arc<RobotManager> {
    Arc::new(RobotManager::new(EventBus::new(), Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default())), RobotManagerConfig::default()))
}

async fn connect_and_register(addr: std::net::SocketAddr, robot_id: RobotId) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let register = RobotMessage::Register {
        ts: 1,
        robot_id,
        robot_name: "robot-1".into(),
        hostname: "host-a".into(),
        environment: "prod".into(),
        tenant_id: Some(TenantId::from("tnt-1")),
        capabilities: RegisterCapabilities { types: vec!["http".into()], max_concurrent_jobs: 4 },
    };
    let payload = serde_json::to_vec(&register).unwrap();
    write_message(&mut stream, &payload).await.unwrap();
    stream
}

#[tokio::test]
async fn a_registering_robot_receives_welcome_and_is_tracked_by_the_manager() {
    let manager = manager();
    let listener = Listener::bind("127.0.0.1:0", manager.clone()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(pending()));

    let robot_id = RobotId::from("rbt-listener-1");
    let mut stream = connect_and_register(addr, robot_id).await;

    let frame = read_message(&mut stream).await.unwrap();
    let msg: ServerMessage = serde_json::from_slice(&frame).unwrap();
    assert!(matches!(msg, ServerMessage::Welcome { .. }));

    let robots = manager.list_robot_snapshots();
    assert_eq!(robots.len(), 1);
    assert_eq!(robots[0].robot_id, robot_id);
}

#[tokio::test]
async fn a_heartbeat_frame_updates_the_robot_in_the_manager() {
    let manager = manager();
    let listener = Listener::bind("127.0.0.1:0", manager.clone()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(pending()));

    let robot_id = RobotId::from("rbt-listener-2");
    let mut stream = connect_and_register(addr, robot_id).await;
    let _welcome = read_message(&mut stream).await.unwrap();

    let heartbeat = RobotMessage::Heartbeat {
        ts: 2,
        metrics: casare_wire::Metrics { cpu_percent: 12.5, memory_mb: 256.0, current_job_count: 0 },
    };
    let payload = serde_json::to_vec(&heartbeat).unwrap();
    write_message(&mut stream, &payload).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let robots = manager.list_robot_snapshots();
    assert_eq!(robots.len(), 1);
    assert!(robots[0].last_heartbeat_ms >= 1);
}

#[tokio::test]
async fn dropping_the_connection_unregisters_the_robot() {
    let manager = manager();
    let listener = Listener::bind("127.0.0.1:0", manager.clone()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(pending()));

    let robot_id = RobotId::from("rbt-listener-3");
    let mut stream = connect_and_register(addr, robot_id).await;
    let _welcome = read_message(&mut stream).await.unwrap();
    drop(stream);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.list_robot_snapshots().is_empty());
}

#[tokio::test]
async fn registration_without_a_tenant_id_is_rejected() {
    let manager = manager();
    let listener = Listener::bind("127.0.0.1:0", manager.clone()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(pending()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let register = RobotMessage::Register {
        ts: 1,
        robot_id: RobotId::from("rbt-listener-4"),
        robot_name: "robot-4".into(),
        hostname: "host-a".into(),
        environment: "prod".into(),
        tenant_id: None,
        capabilities: RegisterCapabilities { types: vec![], max_concurrent_jobs: 1 },
    };
    let payload = serde_json::to_vec(&register).unwrap();
    write_message(&mut stream, &payload).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.list_robot_snapshots().is_empty());
}
