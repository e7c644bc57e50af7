// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! `FileAuditRepository`: the tamper-evident audit log (spec §4.10/§3),
//! grounded on `audit_repository.py`'s SQLite schema and SHA-256 hash
//! chain — reimplemented over the same append-only WAL as
//! [`crate::offline_queue`] rather than a new SQLite dependency, since the
//! spec only commits to the row shape and hash-chain algorithm, not the
//! storage engine.

use crate::wal::Wal;
use casare_core::error::{Classify, ErrorKind};
use casare_core::{RobotId, WorkflowId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Renders an epoch-millisecond timestamp as UTC/ISO-8601 (spec §3's
/// `timestamp_iso`), the form the hash chain is computed over.
fn to_iso(timestamp_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms as i64)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch 0 is a valid timestamp"))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp_ms: u64,
    /// UTC/ISO-8601 rendering of `timestamp_ms`; what the hash chain is
    /// actually computed over (spec §3).
    #[serde(default)]
    pub timestamp_iso: String,
    pub resource: Option<String>,
    pub workflow_id: Option<WorkflowId>,
    pub robot_id: Option<RobotId>,
    pub user_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub client_ip: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// SHA-256 hex digest chaining this event to its predecessor. Set by
    /// [`FileAuditRepository::log_event`]; ignored on input.
    #[serde(default)]
    pub hash_chain: String,
}

impl AuditEvent {
    /// Builds a new unlogged event; `hash_chain` is populated on `log_event`.
    pub fn new(event_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            event_id: nanoid::nanoid!(12),
            event_type: event_type.into(),
            timestamp_ms,
            timestamp_iso: to_iso(timestamp_ms),
            resource: None,
            workflow_id: None,
            robot_id: None,
            user_id: None,
            success: true,
            error_message: None,
            client_ip: None,
            metadata: serde_json::Value::Null,
            hash_chain: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub event_type: Option<String>,
    pub resource: Option<String>,
    pub workflow_id: Option<WorkflowId>,
    pub robot_id: Option<RobotId>,
    pub user_id: Option<String>,
    pub success: Option<bool>,
    pub start_time_ms: Option<u64>,
    pub end_time_ms: Option<u64>,
    pub limit: usize,
    pub offset: usize,
}

impl AuditQuery {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(t) = &self.event_type {
            if &event.event_type != t {
                return false;
            }
        }
        if let Some(r) = &self.resource {
            if !event.resource.as_deref().unwrap_or("").contains(r.as_str()) {
                return false;
            }
        }
        if let Some(w) = self.workflow_id {
            if event.workflow_id != Some(w) {
                return false;
            }
        }
        if let Some(r) = self.robot_id {
            if event.robot_id != Some(r) {
                return false;
            }
        }
        if let Some(u) = &self.user_id {
            if event.user_id.as_deref() != Some(u.as_str()) {
                return false;
            }
        }
        if let Some(s) = self.success {
            if event.success != s {
                return false;
            }
        }
        if let Some(start) = self.start_time_ms {
            if event.timestamp_ms < start {
                return false;
            }
        }
        if let Some(end) = self.end_time_ms {
            if event.timestamp_ms > end {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub events_checked: usize,
    pub first_invalid_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanupReport {
    pub events_deleted: usize,
    pub retention_days: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(String),
    #[error("audit event {0} not found")]
    NotFound(String),
}

impl Classify for AuditError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuditError::Io(_) => ErrorKind::Transient,
            AuditError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

fn io_err(e: std::io::Error) -> AuditError {
    AuditError::Io(e.to_string())
}

fn hash_chain(previous: &str, event_id: &str, timestamp_iso: &str, event_type: &str) -> String {
    let data = format!("{previous}:{event_id}:{timestamp_iso}:{event_type}");
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

const GENESIS: &str = "genesis";

/// WAL-backed, hash-chained audit log. One process writes; many readers
/// query the in-memory index.
pub struct FileAuditRepository {
    path: PathBuf,
    wal: Mutex<Wal>,
    events: Mutex<Vec<AuditEvent>>,
}

impl FileAuditRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let (wal, entries) = Wal::open::<AuditEvent>(&path).map_err(io_err)?;
        let events = entries.into_iter().map(|e| e.record).collect();
        Ok(Self { path, wal: Mutex::new(wal), events: Mutex::new(events) })
    }

    fn last_hash(events: &[AuditEvent]) -> String {
        events.last().map(|e| e.hash_chain.clone()).unwrap_or_else(|| GENESIS.to_string())
    }

    pub fn log_event(&self, mut event: AuditEvent) -> Result<String, AuditError> {
        if event.timestamp_iso.is_empty() {
            event.timestamp_iso = to_iso(event.timestamp_ms);
        }
        let mut events = self.events.lock();
        let previous = Self::last_hash(&events);
        event.hash_chain = hash_chain(&previous, &event.event_id, &event.timestamp_iso, &event.event_type);
        self.wal.lock().append(&event).map_err(io_err)?;
        let id = event.event_id.clone();
        events.push(event);
        Ok(id)
    }

    pub fn log_events_batch(&self, batch: Vec<AuditEvent>) -> Result<usize, AuditError> {
        let count = batch.len();
        for event in batch {
            self.log_event(event)?;
        }
        Ok(count)
    }

    pub fn get_by_id(&self, event_id: &str) -> Option<AuditEvent> {
        self.events.lock().iter().find(|e| e.event_id == event_id).cloned()
    }

    /// Newest-first, matching `ORDER BY timestamp DESC` in the original.
    pub fn query(&self, q: &AuditQuery) -> Vec<AuditEvent> {
        let events = self.events.lock();
        let mut matched: Vec<AuditEvent> = events.iter().filter(|e| q.matches(e)).cloned().collect();
        matched.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        let limit = if q.limit == 0 { matched.len() } else { q.limit };
        matched.into_iter().skip(q.offset).take(limit).collect()
    }

    pub fn event_counts_by_type(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for event in self.events.lock().iter() {
            *counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Recomputes the hash chain over the oldest `limit` events, in
    /// append order, and reports where (if anywhere) it diverges.
    pub fn verify_integrity(&self, limit: usize) -> IntegrityReport {
        let events = self.events.lock();
        let checked: Vec<&AuditEvent> = events.iter().take(limit).collect();
        if checked.is_empty() {
            return IntegrityReport { valid: true, events_checked: 0, first_invalid_id: None };
        }

        let mut previous = GENESIS.to_string();
        for event in &checked {
            let expected = hash_chain(&previous, &event.event_id, &event.timestamp_iso, &event.event_type);
            if expected != event.hash_chain {
                return IntegrityReport {
                    valid: false,
                    events_checked: checked.len(),
                    first_invalid_id: Some(event.event_id.clone()),
                };
            }
            previous = event.hash_chain.clone();
        }

        IntegrityReport { valid: true, events_checked: checked.len(), first_invalid_id: None }
    }

    /// Deletes events older than `retention_days` (relative to `now_ms`),
    /// compacting the WAL file to just the retained events.
    pub fn cleanup_old_events(&self, retention_days: u32, now_ms: u64) -> Result<CleanupReport, AuditError> {
        let cutoff_ms = now_ms.saturating_sub(retention_days as u64 * 24 * 60 * 60 * 1000);
        let mut events = self.events.lock();
        let before = events.len();
        let retained: Vec<AuditEvent> = events.iter().filter(|e| e.timestamp_ms >= cutoff_ms).cloned().collect();
        let deleted = before - retained.len();

        if deleted > 0 {
            self.rewrite(&retained)?;
            *events = retained;
        }

        Ok(CleanupReport { events_deleted: deleted, retention_days })
    }

    fn rewrite(&self, retained: &[AuditEvent]) -> Result<(), AuditError> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let (mut tmp_wal, _): (Wal, Vec<crate::wal::WalEntry<AuditEvent>>) =
                Wal::open(&tmp_path).map_err(io_err)?;
            for event in retained {
                tmp_wal.append(event).map_err(io_err)?;
            }
        }
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        let (wal, _): (Wal, Vec<crate::wal::WalEntry<AuditEvent>>) = Wal::open(&self.path).map_err(io_err)?;
        *self.wal.lock() = wal;
        Ok(())
    }

    pub fn export_to_json(&self, output_path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let events = self.events.lock().clone();
        let export = serde_json::json!({
            "event_count": events.len(),
            "events": events,
        });
        let path = output_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&export).map_err(|e| AuditError::Io(e.to_string()))?)
            .map_err(io_err)?;
        Ok(events.len())
    }

    pub fn export_to_csv(&self, output_path: impl AsRef<Path>) -> Result<usize, AuditError> {
        let events = self.events.lock().clone();
        let path = output_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = std::fs::File::create(path).map_err(io_err)?;
        writeln!(
            file,
            "event_id,event_type,timestamp_ms,timestamp_iso,resource,workflow_id,robot_id,user_id,success,error_message,client_ip"
        )
        .map_err(io_err)?;
        for e in &events {
            writeln!(
                file,
                "{},{},{},{},{},{},{},{},{},{},{}",
                e.event_id,
                e.event_type,
                e.timestamp_ms,
                e.timestamp_iso,
                e.resource.as_deref().unwrap_or(""),
                e.workflow_id.map(|w| w.to_string()).unwrap_or_default(),
                e.robot_id.map(|r| r.to_string()).unwrap_or_default(),
                e.user_id.as_deref().unwrap_or(""),
                e.success,
                e.error_message.as_deref().unwrap_or("").replace(',', ";"),
                e.client_ip.as_deref().unwrap_or(""),
            )
            .map_err(io_err)?;
        }
        Ok(events.len())
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
