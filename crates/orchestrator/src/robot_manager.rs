// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! Robot manager (spec §4.9): owns the fleet's in-memory state — connected
//! robots, in-flight jobs, and the admin broadcast set — behind a single
//! mutex (spec §5: "a single logical owner thread manages the robot/job
//! maps under one mutex"). Session send/receive runs on a per-connection
//! task elsewhere (`listener`); this module only ever talks to a session
//! through the [`SessionHandle`] abstraction, so assignment logic has no
//! socket dependency of its own.
//!
//! `Robot::tenant_id` (`casare-core::repository`) is a mandatory
//! [`TenantId`], not the nullable field the wire protocol's prose
//! describes, so a tenant-agnostic robot isn't representable here. Instead
//! [`Job::tenant_id`](crate::job::Job::tenant_id) carries the
//! "may go to any robot" case: `None` matches every tenant, `Some(t)` only
//! a robot whose `tenant_id == t`.

use crate::job::{Job, JobSpec, JobStatus};
use async_trait::async_trait;
use casare_core::error::Classify;
use casare_core::repository::{Robot, RobotRepository, RobotStatus};
use casare_core::{Clock, Event, EventBus, EventKind, JobId, RobotId, SessionId, SystemClock, TenantId};
use casare_resilience::breaker::{BreakerConfig, CircuitBreaker, CircuitBreakerRegistry, CircuitOpen};
use casare_wire::Metrics;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ADMIN_BROADCAST_TIMEOUT: Duration = Duration::from_secs(1);

/// Failure sending a message over a robot's session.
#[derive(Debug, thiserror::Error)]
pub enum SessionSendError {
    #[error("circuit open, retry in {0}s")]
    CircuitOpen(u64),
    #[error("session closed")]
    Closed,
    #[error("send failed: {0}")]
    Io(String),
}

impl From<CircuitOpen> for SessionSendError {
    fn from(e: CircuitOpen) -> Self {
        SessionSendError::CircuitOpen(e.remaining_seconds)
    }
}

impl Classify for SessionSendError {
    fn kind(&self) -> casare_core::error::ErrorKind {
        match self {
            SessionSendError::CircuitOpen(_) => casare_core::error::ErrorKind::CircuitOpen,
            SessionSendError::Closed | SessionSendError::Io(_) => casare_core::error::ErrorKind::Transient,
        }
    }
}

/// Abstracts the outbound half of a robot's session connection (spec §6.1
/// `job_assign`). Production implementations write a framed [`casare_wire::ServerMessage`];
/// tests substitute an in-memory fake.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn send_job_assign(&self, job: &Job) -> Result<(), SessionSendError>;
}

/// A fleet-event subscriber (spec §4.9 `admin_connections`). A receiver
/// slower than [`ADMIN_BROADCAST_TIMEOUT`] on a single notify is dropped
/// from the set.
#[async_trait]
pub trait AdminSessionHandle: Send + Sync {
    async fn notify(&self, event: &AdminEvent);
}

/// Fleet events broadcast to admin subscribers (spec §4.9).
#[derive(Debug, Clone)]
pub enum AdminEvent {
    RobotConnected(Robot),
    JobRequeued(Job),
    JobCompleted(Job),
}

/// Registration payload a robot sends on connect (spec §6.1 `register`).
#[derive(Debug, Clone)]
pub struct RobotRegistration {
    pub robot_id: RobotId,
    pub session_id: SessionId,
    pub robot_name: String,
    pub hostname: String,
    pub environment: String,
    pub tenant_id: TenantId,
    pub capability_types: Vec<String>,
    pub max_concurrent_jobs: u32,
}

/// In-memory connected-robot record (spec §3 `ConnectedRobot`).
struct ConnectedRobot {
    robot_id: RobotId,
    session_id: SessionId,
    robot_name: String,
    hostname: String,
    environment: String,
    tenant_id: TenantId,
    capability_types: Vec<String>,
    max_concurrent_jobs: u32,
    current_job_ids: HashSet<JobId>,
    last_heartbeat_ms: u64,
    cpu_percent: f64,
    memory_mb: f64,
    session: Arc<dyn SessionHandle>,
    breaker: Arc<CircuitBreaker>,
}

impl ConnectedRobot {
    fn available_slots(&self) -> u32 {
        self.max_concurrent_jobs.saturating_sub(self.current_job_ids.len() as u32)
    }

    /// Derived status (spec §3: `idle | working | busy`). `RobotStatus`
    /// (already shared with the repository layer) has no `working`
    /// variant, so a partially-loaded robot is reported `Busy` the same as
    /// a fully-loaded one; `Draining` is reserved for graceful shutdown,
    /// which this component never initiates on its own.
    fn status(&self) -> RobotStatus {
        if self.current_job_ids.is_empty() {
            RobotStatus::Idle
        } else {
            RobotStatus::Busy
        }
    }

    fn to_robot(&self, session_id: Option<SessionId>) -> Robot {
        Robot {
            robot_id: self.robot_id,
            tenant_id: self.tenant_id,
            name: self.robot_name.clone(),
            status: self.status(),
            max_concurrent_jobs: self.max_concurrent_jobs,
            current_job_count: self.current_job_ids.len() as u32,
            session_id,
            last_heartbeat_ms: self.last_heartbeat_ms,
            tags: self.capability_types.clone(),
        }
    }
}

struct AdminSubscriber {
    id: u64,
    handle: Arc<dyn AdminSessionHandle>,
}

struct State {
    robots: HashMap<RobotId, ConnectedRobot>,
    jobs: HashMap<JobId, Job>,
}

#[derive(Debug, Clone, Copy)]
pub struct RobotManagerConfig {
    pub heartbeat_timeout_ms: u64,
}

impl Default for RobotManagerConfig {
    fn default() -> Self {
        Self { heartbeat_timeout_ms: 30_000 }
    }
}

/// The fleet state machine (spec §4.9). Generic over [`Clock`] so tests can
/// drive heartbeat-timeout sweeps deterministically.
pub struct RobotManager<C: Clock = SystemClock> {
    clock: C,
    config: RobotManagerConfig,
    state: Mutex<State>,
    admin: Mutex<Vec<AdminSubscriber>>,
    next_admin_id: AtomicU64,
    breakers: Arc<CircuitBreakerRegistry>,
    event_bus: EventBus,
    robot_repository: Option<Arc<dyn RobotRepository>>,
}

impl RobotManager<SystemClock> {
    pub fn new(event_bus: EventBus, breakers: Arc<CircuitBreakerRegistry>, config: RobotManagerConfig) -> Self {
        Self::with_clock(event_bus, breakers, config, SystemClock)
    }
}

impl<C: Clock> RobotManager<C> {
    pub fn with_clock(event_bus: EventBus, breakers: Arc<CircuitBreakerRegistry>, config: RobotManagerConfig, clock: C) -> Self {
        Self {
            clock,
            config,
            state: Mutex::new(State { robots: HashMap::new(), jobs: HashMap::new() }),
            admin: Mutex::new(Vec::new()),
            next_admin_id: AtomicU64::new(1),
            breakers,
            event_bus,
            robot_repository: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn RobotRepository>) -> Self {
        self.robot_repository = Some(repository);
        self
    }

    /// Registers a subscriber for fleet events; returns a handle for
    /// [`RobotManager::unsubscribe_admin`].
    pub fn subscribe_admin(&self, handle: Arc<dyn AdminSessionHandle>) -> u64 {
        let id = self.next_admin_id.fetch_add(1, Ordering::Relaxed);
        self.admin.lock().push(AdminSubscriber { id, handle });
        id
    }

    pub fn unsubscribe_admin(&self, id: u64) {
        self.admin.lock().retain(|s| s.id != id);
    }

    async fn broadcast_admin(&self, event: AdminEvent) {
        let subscribers: Vec<(u64, Arc<dyn AdminSessionHandle>)> =
            self.admin.lock().iter().map(|s| (s.id, s.handle.clone())).collect();

        let mut stale = Vec::new();
        for (id, handle) in subscribers {
            if tokio::time::timeout(ADMIN_BROADCAST_TIMEOUT, handle.notify(&event)).await.is_err() {
                tracing::warn!(admin_id = id, "admin broadcast receiver timed out, dropping subscriber");
                stale.push(id);
            }
        }
        if !stale.is_empty() {
            self.admin.lock().retain(|s| !stale.contains(&s.id));
        }
    }

    fn snapshot_robot(&self, robot_id: RobotId) -> Option<Robot> {
        self.state.lock().robots.get(&robot_id).map(|r| r.to_robot(Some(r.session_id)))
    }

    pub fn list_robot_snapshots(&self) -> Vec<Robot> {
        self.state.lock().robots.values().map(|r| r.to_robot(Some(r.session_id))).collect()
    }

    pub fn job_snapshot(&self, job_id: JobId) -> Option<Job> {
        self.state.lock().jobs.get(&job_id).cloned()
    }

    pub fn list_job_snapshots(&self) -> Vec<Job> {
        self.state.lock().jobs.values().cloned().collect()
    }

    /// Robot ids whose last heartbeat is older than the configured
    /// timeout. A timer task calls this, then [`Self::unregister_robot`]
    /// on each with reason `heartbeat_lost` (spec §4.9).
    pub fn stale_robot_ids(&self) -> Vec<RobotId> {
        let now = self.clock.epoch_ms();
        self.state
            .lock()
            .robots
            .values()
            .filter(|r| now.saturating_sub(r.last_heartbeat_ms) > self.config.heartbeat_timeout_ms)
            .map(|r| r.robot_id)
            .collect()
    }

    pub async fn sweep_stale_heartbeats(&self) {
        for robot_id in self.stale_robot_ids() {
            self.unregister_robot(robot_id, "heartbeat_lost").await;
        }
    }

    /// Registers a newly connected robot (spec §4.9 `register_robot`).
    pub async fn register_robot(&self, session: Arc<dyn SessionHandle>, registration: RobotRegistration) -> Robot {
        let now = self.clock.epoch_ms();
        let breaker = self.breakers.get_or_create(&format!("robot-session:{}", registration.robot_id), Some(BreakerConfig::default()));

        let connected = ConnectedRobot {
            robot_id: registration.robot_id,
            session_id: registration.session_id,
            robot_name: registration.robot_name,
            hostname: registration.hostname,
            environment: registration.environment,
            tenant_id: registration.tenant_id,
            capability_types: registration.capability_types,
            max_concurrent_jobs: registration.max_concurrent_jobs,
            current_job_ids: HashSet::new(),
            last_heartbeat_ms: now,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            session,
            breaker,
        };
        let robot = connected.to_robot(Some(connected.session_id));

        self.state.lock().robots.insert(registration.robot_id, connected);

        if let Some(repo) = &self.robot_repository {
            if let Err(err) = repo.upsert(robot.clone()).await {
                tracing::warn!(robot_id = %robot.robot_id, error = %err, "failed to persist robot registration");
            }
        }

        self.broadcast_admin(AdminEvent::RobotConnected(robot.clone())).await;
        self.event_bus.publish(Event::new(EventKind::RobotRegistered, now).with_robot(robot.robot_id));

        robot
    }

    /// Disconnects a robot and requeues its in-flight jobs (spec §4.9
    /// `unregister_robot`). Idempotent: unregistering an already-absent
    /// robot is a no-op (testable property #6).
    pub async fn unregister_robot(&self, robot_id: RobotId, reason: &str) {
        let (orphans, offline_snapshot) = {
            let mut state = self.state.lock();
            let Some(mut robot) = state.robots.remove(&robot_id) else {
                return;
            };
            let orphans: Vec<JobId> = robot.current_job_ids.drain().collect();
            for job_id in &orphans {
                if let Some(job) = state.jobs.get_mut(job_id) {
                    job.status = JobStatus::Pending;
                    job.assigned_robot_id = None;
                }
            }
            robot.cpu_percent = 0.0;
            (orphans, robot.to_robot(None))
        };

        if let Some(repo) = &self.robot_repository {
            let mut offline = offline_snapshot;
            offline.status = RobotStatus::Offline;
            if let Err(err) = repo.upsert(offline).await {
                tracing::warn!(robot_id = %robot_id, error = %err, "failed to persist robot offline status");
            }
        }

        self.event_bus.publish(
            Event::new(EventKind::RobotDisconnected, self.clock.epoch_ms())
                .with_robot(robot_id)
                .with_message(reason.to_string()),
        );

        for job_id in orphans {
            self.try_assign_job(job_id).await;
        }
    }

    /// Records a heartbeat (spec §4.9 `update_heartbeat`). Returns `false`
    /// if the robot isn't currently connected.
    pub async fn update_heartbeat(&self, robot_id: RobotId, metrics: Metrics) -> bool {
        let now = self.clock.epoch_ms();
        let found = {
            let mut state = self.state.lock();
            let Some(robot) = state.robots.get_mut(&robot_id) else {
                return false;
            };
            robot.last_heartbeat_ms = now;
            robot.cpu_percent = metrics.cpu_percent;
            robot.memory_mb = metrics.memory_mb;
            true
        };

        if let Some(repo) = &self.robot_repository {
            if let Some(robot) = self.snapshot_robot(robot_id) {
                if let Err(err) = repo.upsert(robot).await {
                    tracing::warn!(robot_id = %robot_id, error = %err, "failed to persist heartbeat");
                }
            }
        }

        self.event_bus.publish(Event::new(EventKind::RobotHeartbeat, now).with_robot(robot_id));
        found
    }

    /// Accepts a new job submission (spec §4.9 `submit_job`).
    pub async fn submit_job(&self, spec: JobSpec) -> Job {
        let now = self.clock.epoch_ms();
        let job = Job::new(JobId::new(), spec, now);
        self.state.lock().jobs.insert(job.job_id, job.clone());

        self.event_bus.publish(Event::new(EventKind::JobSubmitted, now).with_job(job.job_id));
        self.try_assign_job(job.job_id).await;

        self.job_snapshot(job.job_id).unwrap_or(job)
    }

    fn select_candidate(&self, state: &State, job: &Job) -> Option<RobotId> {
        if let Some(target) = job.target_robot_id {
            return state
                .robots
                .get(&target)
                .filter(|r| job.accepts_tenant(r.tenant_id) && r.available_slots() > 0 && !job.rejected_by.contains(&target))
                .map(|_| target);
        }

        state
            .robots
            .values()
            .filter(|r| {
                job.accepts_tenant(r.tenant_id)
                    && r.available_slots() > 0
                    && !job.rejected_by.contains(&r.robot_id)
                    && job.required_capabilities.iter().all(|cap| r.capability_types.iter().any(|t| t == cap))
            })
            .min_by_key(|r| r.current_job_ids.len())
            .map(|r| r.robot_id)
    }

    /// Attempts to assign a pending job to a candidate robot (spec §4.9
    /// `try_assign_job`), optimistically mutating state before the
    /// breaker-guarded send and rolling back on failure.
    pub async fn try_assign_job(&self, job_id: JobId) -> bool {
        struct Assignment {
            robot_id: RobotId,
            session: Arc<dyn SessionHandle>,
            breaker: Arc<CircuitBreaker>,
            job: Job,
        }

        let assignment = {
            let mut state = self.state.lock();
            let Some(job) = state.jobs.get(&job_id).cloned() else {
                return false;
            };
            if job.status != JobStatus::Pending {
                return false;
            }
            let Some(robot_id) = self.select_candidate(&state, &job) else {
                return false;
            };

            let robot = state.robots.get_mut(&robot_id).expect("candidate selected from robots map");
            robot.current_job_ids.insert(job_id);
            let session = robot.session.clone();
            let breaker = robot.breaker.clone();

            let job_mut = state.jobs.get_mut(&job_id).expect("job looked up above");
            job_mut.status = JobStatus::Assigned;
            job_mut.assigned_robot_id = Some(robot_id);
            let job = job_mut.clone();

            Assignment { robot_id, session, breaker, job }
        };

        if let Some(repo) = &self.robot_repository {
            if let Some(robot) = self.snapshot_robot(assignment.robot_id) {
                if let Err(err) = repo.upsert(robot).await {
                    tracing::warn!(robot_id = %assignment.robot_id, error = %err, "failed to persist job assignment");
                }
            }
        }

        let job_for_send = assignment.job.clone();
        let session = assignment.session.clone();
        let send_result = assignment.breaker.call_async(move || async move { session.send_job_assign(&job_for_send).await }).await;

        match send_result {
            Ok(()) => {
                self.event_bus.publish(
                    Event::new(EventKind::JobAssigned, self.clock.epoch_ms()).with_job(job_id).with_robot(assignment.robot_id),
                );
                true
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, robot_id = %assignment.robot_id, error = %err, "job_assign send failed, rolling back");
                let mut state = self.state.lock();
                if let Some(robot) = state.robots.get_mut(&assignment.robot_id) {
                    robot.current_job_ids.remove(&job_id);
                }
                if let Some(job) = state.jobs.get_mut(&job_id) {
                    job.status = JobStatus::Pending;
                    job.assigned_robot_id = None;
                }
                false
            }
        }
    }

    /// Returns a job to the pending pool after a robot rejects or loses it
    /// (spec §4.9 `requeue_job`), then retries assignment against the
    /// remaining candidates.
    pub async fn requeue_job(&self, robot_id: RobotId, job_id: JobId, reason: &str) {
        {
            let mut state = self.state.lock();
            if let Some(robot) = state.robots.get_mut(&robot_id) {
                robot.current_job_ids.remove(&job_id);
            }
            if let Some(job) = state.jobs.get_mut(&job_id) {
                job.rejected_by.insert(robot_id);
                job.status = JobStatus::Pending;
                job.assigned_robot_id = None;
            }
        }

        if let Some(repo) = &self.robot_repository {
            if let Some(robot) = self.snapshot_robot(robot_id) {
                if let Err(err) = repo.upsert(robot).await {
                    tracing::warn!(robot_id = %robot_id, error = %err, "failed to persist requeue");
                }
            }
        }

        self.event_bus.publish(
            Event::new(EventKind::JobRequeued, self.clock.epoch_ms())
                .with_job(job_id)
                .with_robot(robot_id)
                .with_message(reason.to_string()),
        );

        if let Some(job) = self.job_snapshot(job_id) {
            self.broadcast_admin(AdminEvent::JobRequeued(job)).await;
        }

        self.try_assign_job(job_id).await;
    }

    /// Records a job's terminal outcome reported by its robot (spec §4.9
    /// `job_completed`).
    pub async fn job_completed(&self, robot_id: RobotId, job_id: JobId, success: bool, result: Option<Value>) {
        {
            let mut state = self.state.lock();
            if let Some(robot) = state.robots.get_mut(&robot_id) {
                robot.current_job_ids.remove(&job_id);
            }
            if let Some(job) = state.jobs.get_mut(&job_id) {
                job.status = if success { JobStatus::Completed } else { JobStatus::Failed };
            }
        }

        if let Some(repo) = &self.robot_repository {
            if let Some(robot) = self.snapshot_robot(robot_id) {
                if let Err(err) = repo.upsert(robot).await {
                    tracing::warn!(robot_id = %robot_id, error = %err, "failed to persist job completion");
                }
            }
        }

        let mut event = Event::new(EventKind::JobCompleted, self.clock.epoch_ms()).with_job(job_id).with_robot(robot_id);
        if !success {
            event = event.with_message("job failed");
        }
        if let Some(result) = result {
            event.data.extra.insert("result".to_string(), result);
        }
        self.event_bus.publish(event);

        if let Some(job) = self.job_snapshot(job_id) {
            self.broadcast_admin(AdminEvent::JobCompleted(job)).await;
        }
    }
}

#[cfg(test)]
#[path = "robot_manager_tests.rs"]
mod tests;
