// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

//! A minimal append-only write-ahead log: one JSON record per line,
//! `fsync`'d after every append, replayed in full to rebuild in-memory
//! state on open. Grounded on the teacher's `oj-storage::Wal` (sequence
//! numbers, append-then-flush, replay-from-scratch on restart) but
//! simplified to whole-file replay since `casare-storage`'s callers
//! (C9, C11) rebuild one small in-memory index rather than a
//! `MaterializedState` covering a whole daemon's domain.

use serde::{de::DeserializeOwned, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One replayed record, tagged with the sequence number it was appended
/// under. Sequence numbers are 1-based and monotonically increasing.
#[derive(Debug, Clone)]
pub struct WalEntry<T> {
    pub seq: u64,
    pub record: T,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Line<T> {
    seq: u64,
    record: T,
}

/// An append-only log backing one durable store. Not `Clone`; callers wrap
/// it in a `Mutex` alongside the in-memory index it rebuilds.
pub struct Wal {
    file: File,
    path: PathBuf,
    next_seq: u64,
}

impl Wal {
    /// Opens (creating if absent) the log at `path` and replays every
    /// existing record as `T`, in append order.
    pub fn open<T: DeserializeOwned>(path: impl AsRef<Path>) -> io::Result<(Self, Vec<WalEntry<T>>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let read_file = OpenOptions::new().read(true).open(&path);
        let mut entries = Vec::new();
        let mut next_seq = 1u64;
        if let Ok(f) = read_file {
            for line in BufReader::new(f).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let parsed: Line<T> = serde_json::from_str(&line)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                next_seq = next_seq.max(parsed.seq + 1);
                entries.push(WalEntry { seq: parsed.seq, record: parsed.record });
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok((Self { file, path, next_seq }, entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sequence number of the most recently appended record, or 0 if
    /// the log is empty. Used by snapshot compaction to record how far a
    /// snapshot covers.
    pub fn write_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }

    /// Appends `record`, fsyncing before returning so the write survives a
    /// crash immediately after (spec §4.8: "batches not atomic, single
    /// records durable under SIGKILL").
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<u64> {
        let seq = self.next_seq;
        let line = Line { seq, record };
        let mut json = serde_json::to_vec(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        json.push(b'\n');
        self.file.write_all(&json)?;
        self.file.sync_all()?;
        self.next_seq += 1;
        Ok(seq)
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
