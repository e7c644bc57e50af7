// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! `FileOfflineQueue`: the concrete, WAL-backed [`OfflineQueue`] (spec
//! §4.8), grounded on `oj-storage`'s replay-on-open discipline
//! (`state::MaterializedState` / `migration_tests.rs`). Every mutation is
//! first appended to the log, then folded into the in-memory index — the
//! log is authoritative, the index is a cache rebuilt from it on open.

use crate::wal::{Wal, WalEntry};
use async_trait::async_trait;
use casare_core::offline_queue::{CheckpointState, OfflineQueue, OfflineQueueError, QueuedJob};
use casare_core::{CheckpointId, JobId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Record {
    EnqueueJob(QueuedJob),
    RemoveJob(JobId),
    SaveCheckpoint(CheckpointState),
    ClearCheckpointsForJob(JobId),
}

struct Index {
    /// Queued jobs, oldest first; `remove_job` deletes in place.
    jobs: Vec<QueuedJob>,
    checkpoints: HashMap<CheckpointId, CheckpointState>,
    /// Most recent checkpoint id per job, insertion order tracked by
    /// `CheckpointState::created_at_ms` so `latest_checkpoint_for_job`
    /// doesn't need a linear scan keyed differently than `save_checkpoint`.
    latest_by_job: HashMap<JobId, CheckpointId>,
}

impl Index {
    fn new() -> Self {
        Self { jobs: Vec::new(), checkpoints: HashMap::new(), latest_by_job: HashMap::new() }
    }

    fn apply(&mut self, record: &Record) {
        match record {
            Record::EnqueueJob(job) => {
                if !self.jobs.iter().any(|j| j.job_id == job.job_id) {
                    self.jobs.push(job.clone());
                }
            }
            Record::RemoveJob(job_id) => {
                self.jobs.retain(|j| j.job_id != *job_id);
            }
            Record::SaveCheckpoint(state) => {
                self.latest_by_job.insert(state.job_id, state.checkpoint_id.clone());
                self.checkpoints.insert(state.checkpoint_id.clone(), state.clone());
            }
            Record::ClearCheckpointsForJob(job_id) => {
                self.checkpoints.retain(|_, state| state.job_id != *job_id);
                self.latest_by_job.remove(job_id);
            }
        }
    }
}

fn io_err(e: std::io::Error) -> OfflineQueueError {
    OfflineQueueError::Io(e.to_string())
}

/// A zstd-compressed snapshot of the index at a given WAL sequence,
/// mirroring `oj-storage`'s periodic zstd snapshot of `MaterializedState`:
/// opening replays only the WAL records written after `through_seq`
/// instead of the whole log.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    through_seq: u64,
    jobs: Vec<QueuedJob>,
    checkpoints: Vec<CheckpointState>,
}

/// A durable, single-process offline queue backed by one append-only file
/// plus an optional compacting snapshot.
pub struct FileOfflineQueue {
    wal: Mutex<Wal>,
    index: Mutex<Index>,
    snapshot_path: PathBuf,
}

impl FileOfflineQueue {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OfflineQueueError> {
        let path = path.as_ref();
        let snapshot_path = path.with_extension("snapshot.zst");

        let mut index = Index::new();
        let mut through_seq = 0u64;
        if let Some(snapshot) = Self::read_snapshot(&snapshot_path)? {
            through_seq = snapshot.through_seq;
            for job in snapshot.jobs {
                index.apply(&Record::EnqueueJob(job));
            }
            for state in snapshot.checkpoints {
                index.apply(&Record::SaveCheckpoint(state));
            }
        }

        let (wal, entries): (Wal, Vec<WalEntry<Record>>) = Wal::open(path).map_err(io_err)?;
        for entry in &entries {
            if entry.seq > through_seq {
                index.apply(&entry.record);
            }
        }

        Ok(Self { wal: Mutex::new(wal), index: Mutex::new(index), snapshot_path })
    }

    fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, OfflineQueueError> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = std::fs::read(path).map_err(io_err)?;
        let decoder = zstd::stream::Decoder::new(compressed.as_slice()).map_err(io_err)?;
        let snapshot: Snapshot = serde_json::from_reader(decoder)
            .map_err(|e| OfflineQueueError::Serialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    fn append(&self, record: Record) -> Result<(), OfflineQueueError> {
        self.wal.lock().append(&record).map_err(io_err)?;
        self.index.lock().apply(&record);
        Ok(())
    }

    /// Writes a fresh snapshot of the current index so a future `open` can
    /// skip replaying everything written so far. The WAL file itself is
    /// left untouched; entries at or below `through_seq` are simply
    /// ignored on the next open.
    pub fn compact(&self) -> Result<(), OfflineQueueError> {
        let through_seq = self.wal.lock().write_seq();
        let index = self.index.lock();
        let snapshot = Snapshot {
            through_seq,
            jobs: index.jobs.clone(),
            checkpoints: index.checkpoints.values().cloned().collect(),
        };
        drop(index);

        let json = serde_json::to_vec(&snapshot).map_err(|e| OfflineQueueError::Serialization(e.to_string()))?;
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 0).map_err(io_err)?;
        encoder.write_all(&json).map_err(io_err)?;
        let compressed = encoder.finish().map_err(io_err)?;

        let tmp_path = self.snapshot_path.with_extension("zst.tmp");
        std::fs::write(&tmp_path, compressed).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.snapshot_path).map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl OfflineQueue for FileOfflineQueue {
    async fn enqueue_job(&self, job: QueuedJob) -> Result<(), OfflineQueueError> {
        self.append(Record::EnqueueJob(job))
    }

    async fn dequeue_job(&self) -> Result<Option<QueuedJob>, OfflineQueueError> {
        Ok(self.index.lock().jobs.first().cloned())
    }

    async fn remove_job(&self, job_id: JobId) -> Result<(), OfflineQueueError> {
        self.append(Record::RemoveJob(job_id))
    }

    async fn save_checkpoint(&self, state: CheckpointState) -> Result<(), OfflineQueueError> {
        self.append(Record::SaveCheckpoint(state))
    }

    async fn load_checkpoint(&self, id: &CheckpointId) -> Result<CheckpointState, OfflineQueueError> {
        self.index
            .lock()
            .checkpoints
            .get(id)
            .cloned()
            .ok_or_else(|| OfflineQueueError::CheckpointNotFound(id.clone()))
    }

    async fn latest_checkpoint_for_job(&self, job_id: JobId) -> Result<Option<CheckpointState>, OfflineQueueError> {
        let index = self.index.lock();
        Ok(index.latest_by_job.get(&job_id).and_then(|id| index.checkpoints.get(id)).cloned())
    }

    async fn clear_checkpoints_for_job(&self, job_id: JobId) -> Result<(), OfflineQueueError> {
        self.append(Record::ClearCheckpointsForJob(job_id))
    }

    async fn pending_jobs(&self) -> Result<Vec<QueuedJob>, OfflineQueueError> {
        Ok(self.index.lock().jobs.clone())
    }
}

#[cfg(test)]
#[path = "offline_queue_tests.rs"]
mod tests;
