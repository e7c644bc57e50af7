// SPDX-License-Identifier: MIT
// Copyright (c) 2026 CasareRPA Contributors

use super::*;
use tempfile::tempdir;

#[test]
fn open_on_a_missing_file_creates_it_with_no_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let (_wal, entries): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
    assert!(path.exists());
    assert!(entries.is_empty());
}

#[test]
fn append_assigns_increasing_one_based_sequence_numbers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    let (mut wal, _): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();

    assert_eq!(wal.append(&"a".to_string()).unwrap(), 1);
    assert_eq!(wal.append(&"b".to_string()).unwrap(), 2);
}

#[test]
fn reopening_replays_every_appended_record_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let (mut wal, _): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
        wal.append(&"first".to_string()).unwrap();
        wal.append(&"second".to_string()).unwrap();
    }

    let (_wal, entries): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[0].record, "first");
    assert_eq!(entries[1].seq, 2);
    assert_eq!(entries[1].record, "second");
}

#[test]
fn reopening_continues_the_sequence_counter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let (mut wal, _): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
        wal.append(&"a".to_string()).unwrap();
    }

    let (mut wal, entries): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(wal.append(&"b".to_string()).unwrap(), 2);
}

#[test]
fn write_seq_tracks_the_last_appended_sequence_number() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    let (mut wal, _): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 0);
    wal.append(&"a".to_string()).unwrap();
    wal.append(&"b".to_string()).unwrap();
    assert_eq!(wal.write_seq(), 2);
}

#[test]
fn blank_lines_are_skipped_on_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");
    {
        let (mut wal, _): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
        wal.append(&"a".to_string()).unwrap();
    }
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push('\n');
    std::fs::write(&path, contents).unwrap();

    let (_wal, entries): (Wal, Vec<WalEntry<String>>) = Wal::open(&path).unwrap();
    assert_eq!(entries.len(), 1);
}
