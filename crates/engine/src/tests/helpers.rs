//! Fixture construction: real table files, a real descriptor log, and a
//! `CURRENT` pointer, built with the workspace's own writers.

use format::comparator::{BytewiseComparator, BYTEWISE_NAME};
use format::internal_key::{encode_internal_key, InternalKeyComparator, ValueType};
use sstable::TableWriter;
use std::fs;
use std::path::Path;
use wal::LogWriter;

use crate::{table_file_name, FileMetadata, VersionEdit, CURRENT_FILENAME};

/// `(user key, sequence, value-or-tombstone)`.
pub type Record = (Vec<u8>, u64, Option<Vec<u8>>);

/// A table to be materialized at a level.
pub struct FixtureTable {
    pub level: u32,
    pub number: u64,
    pub records: Vec<Record>,
}

pub fn ikey_cmp() -> InternalKeyComparator {
    InternalKeyComparator::new(&BytewiseComparator)
}

/// Writes `{number:06}.ldb` from the given records and returns its manifest
/// metadata.
pub fn write_table(dir: &Path, number: u64, records: &[Record]) -> FileMetadata {
    write_table_with_extension(dir, number, records, "ldb")
}

pub fn write_table_with_extension(
    dir: &Path,
    number: u64,
    records: &[Record],
    extension: &str,
) -> FileMetadata {
    let cmp = ikey_cmp();
    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = records
        .iter()
        .map(|(user_key, seq, value)| {
            let vt = if value.is_some() {
                ValueType::Value
            } else {
                ValueType::Deletion
            };
            (
                encode_internal_key(user_key, *seq, vt),
                value.clone().unwrap_or_default(),
            )
        })
        .collect();
    entries.sort_by(|a, b| cmp.compare(&a.0, &b.0));

    let path = dir.join(table_file_name(number, extension));
    let mut writer = TableWriter::create(&path, cmp).unwrap();
    for (k, v) in &entries {
        writer.add(k, v).unwrap();
    }
    let size = writer.finish().unwrap();

    FileMetadata {
        number,
        size,
        smallest: entries.first().map(|(k, _)| k.clone()).unwrap_or_default(),
        largest: entries.last().map(|(k, _)| k.clone()).unwrap_or_default(),
    }
}

/// Writes `MANIFEST-000001` holding the given edits and points `CURRENT` at it.
pub fn write_manifest(dir: &Path, edits: &[VersionEdit]) {
    write_named_manifest(dir, "MANIFEST-000001", edits);
}

pub fn write_named_manifest(dir: &Path, name: &str, edits: &[VersionEdit]) {
    let mut log = LogWriter::create(dir.join(name)).unwrap();
    for edit in edits {
        log.append(&edit.encode()).unwrap();
    }
    log.sync().unwrap();
    fs::write(dir.join(CURRENT_FILENAME), format!("{name}\n")).unwrap();
}

/// Materializes tables and a one-edit manifest describing them.
pub fn install_db(dir: &Path, tables: Vec<FixtureTable>) {
    let mut edit = VersionEdit {
        comparator: Some(BYTEWISE_NAME.to_string()),
        log_number: Some(0),
        prev_log_number: Some(0),
        ..VersionEdit::default()
    };

    let mut max_number = 1;
    let mut max_seq = 0;
    for table in &tables {
        let meta = write_table(dir, table.number, &table.records);
        max_number = max_number.max(table.number);
        max_seq = max_seq.max(table.records.iter().map(|(_, s, _)| *s).max().unwrap_or(0));
        edit.new_files.push((table.level, meta));
    }
    edit.next_file_number = Some(max_number + 1);
    edit.last_sequence = Some(max_seq);

    write_manifest(dir, &[edit]);
}

/// Shorthand for a live-value record.
pub fn put(key: &[u8], seq: u64, value: &[u8]) -> Record {
    (key.to_vec(), seq, Some(value.to_vec()))
}

/// Shorthand for a tombstone record.
pub fn del(key: &[u8], seq: u64) -> Record {
    (key.to_vec(), seq, None)
}
