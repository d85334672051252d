//! Version edits and the live version.
//!
//! The descriptor log is a stream of [`VersionEdit`] records; folding them
//! in order yields the current [`Version`]: which table files are live at
//! which level, plus the bookkeeping counters. For this read-only engine the
//! version is built once at open and never changes.

use format::internal_key::InternalKeyComparator;
use format::span::{put_length_prefixed_bytes, put_varint_u64, SpanReader};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// Levels the store can place tables at.
pub const NUM_LEVELS: usize = 7;

/// Field tags in an encoded version edit.
mod tag {
    pub const COMPARATOR: u64 = 1;
    pub const LOG_NUMBER: u64 = 2;
    pub const NEXT_FILE_NUMBER: u64 = 3;
    pub const LAST_SEQUENCE: u64 = 4;
    pub const COMPACT_POINTER: u64 = 5;
    pub const DELETED_FILE: u64 = 6;
    pub const NEW_FILE: u64 = 7;
    pub const PREV_LOG_NUMBER: u64 = 9;
}

/// What the manifest records about one live table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub number: u64,
    pub size: u64,
    /// Smallest internal key in the file.
    pub smallest: Vec<u8>,
    /// Largest internal key in the file.
    pub largest: Vec<u8>,
}

impl FileMetadata {
    /// User-key bounds, with the trailers stripped.
    fn user_bounds(&self) -> (&[u8], &[u8]) {
        (user_part(&self.smallest), user_part(&self.largest))
    }
}

fn user_part(internal_key: &[u8]) -> &[u8] {
    // Bounds are validated to carry a trailer when the version is built.
    &internal_key[..internal_key.len().saturating_sub(8)]
}

/// One tagged delta from the descriptor log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionEdit {
    pub comparator: Option<String>,
    pub log_number: Option<u64>,
    pub prev_log_number: Option<u64>,
    pub next_file_number: Option<u64>,
    pub last_sequence: Option<u64>,
    pub compact_pointers: Vec<(u32, Vec<u8>)>,
    pub deleted_files: Vec<(u32, u64)>,
    pub new_files: Vec<(u32, FileMetadata)>,
}

impl VersionEdit {
    /// Decodes one descriptor-log payload.
    ///
    /// # Errors
    ///
    /// `Corruption` on an unknown tag or any truncated field.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut edit = VersionEdit::default();
        let mut rdr = SpanReader::new(payload);

        while !rdr.is_eof() {
            let tag = rdr.read_varint_u64()?;
            match tag {
                tag::COMPARATOR => {
                    edit.comparator = Some(rdr.read_length_prefixed_str()?.to_string());
                }
                tag::LOG_NUMBER => edit.log_number = Some(rdr.read_varint_u64()?),
                tag::PREV_LOG_NUMBER => edit.prev_log_number = Some(rdr.read_varint_u64()?),
                tag::NEXT_FILE_NUMBER => edit.next_file_number = Some(rdr.read_varint_u64()?),
                tag::LAST_SEQUENCE => edit.last_sequence = Some(rdr.read_varint_u64()?),
                tag::COMPACT_POINTER => {
                    let level = read_level(&mut rdr)?;
                    let key = rdr.read_length_prefixed_bytes()?.to_vec();
                    edit.compact_pointers.push((level, key));
                }
                tag::DELETED_FILE => {
                    let level = read_level(&mut rdr)?;
                    let number = rdr.read_varint_u64()?;
                    edit.deleted_files.push((level, number));
                }
                tag::NEW_FILE => {
                    let level = read_level(&mut rdr)?;
                    let number = rdr.read_varint_u64()?;
                    let size = rdr.read_varint_u64()?;
                    let smallest = rdr.read_length_prefixed_bytes()?.to_vec();
                    let largest = rdr.read_length_prefixed_bytes()?.to_vec();
                    edit.new_files.push((
                        level,
                        FileMetadata {
                            number,
                            size,
                            smallest,
                            largest,
                        },
                    ));
                }
                other => {
                    return Err(Error::Corruption(format!(
                        "unknown version edit tag {other}"
                    )));
                }
            }
        }
        Ok(edit)
    }

    /// Encodes this edit as a descriptor-log payload.
    ///
    /// The read path never writes a manifest; this is the writer half used
    /// by fixtures and round-trip tests.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(name) = &self.comparator {
            put_varint_u64(&mut buf, tag::COMPARATOR);
            put_length_prefixed_bytes(&mut buf, name.as_bytes());
        }
        if let Some(n) = self.log_number {
            put_varint_u64(&mut buf, tag::LOG_NUMBER);
            put_varint_u64(&mut buf, n);
        }
        if let Some(n) = self.prev_log_number {
            put_varint_u64(&mut buf, tag::PREV_LOG_NUMBER);
            put_varint_u64(&mut buf, n);
        }
        if let Some(n) = self.next_file_number {
            put_varint_u64(&mut buf, tag::NEXT_FILE_NUMBER);
            put_varint_u64(&mut buf, n);
        }
        if let Some(n) = self.last_sequence {
            put_varint_u64(&mut buf, tag::LAST_SEQUENCE);
            put_varint_u64(&mut buf, n);
        }
        for (level, key) in &self.compact_pointers {
            put_varint_u64(&mut buf, tag::COMPACT_POINTER);
            put_varint_u64(&mut buf, u64::from(*level));
            put_length_prefixed_bytes(&mut buf, key);
        }
        for (level, number) in &self.deleted_files {
            put_varint_u64(&mut buf, tag::DELETED_FILE);
            put_varint_u64(&mut buf, u64::from(*level));
            put_varint_u64(&mut buf, *number);
        }
        for (level, meta) in &self.new_files {
            put_varint_u64(&mut buf, tag::NEW_FILE);
            put_varint_u64(&mut buf, u64::from(*level));
            put_varint_u64(&mut buf, meta.number);
            put_varint_u64(&mut buf, meta.size);
            put_length_prefixed_bytes(&mut buf, &meta.smallest);
            put_length_prefixed_bytes(&mut buf, &meta.largest);
        }
        buf
    }
}

fn read_level(rdr: &mut SpanReader<'_>) -> Result<u32> {
    let level = rdr.read_varint_u64()?;
    if level >= NUM_LEVELS as u64 {
        return Err(Error::Corruption(format!("level {level} out of range")));
    }
    Ok(level as u32)
}

/// Accumulates descriptor edits into the state a [`Version`] is built from.
///
/// Single-valued fields overwrite; file additions and deletions accumulate,
/// and a deleted file number removes any earlier addition.
#[derive(Debug, Default)]
pub struct VersionBuilder {
    comparator: Option<String>,
    log_number: u64,
    prev_log_number: u64,
    next_file_number: u64,
    last_sequence: u64,
    compact_pointers: BTreeMap<u32, Vec<u8>>,
    deleted: BTreeSet<u64>,
    new_files: Vec<(u32, FileMetadata)>,
}

impl VersionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one edit into the accumulated state.
    pub fn apply(&mut self, edit: VersionEdit) {
        if let Some(name) = edit.comparator {
            self.comparator = Some(name);
        }
        if let Some(n) = edit.log_number {
            self.log_number = n;
        }
        if let Some(n) = edit.prev_log_number {
            self.prev_log_number = n;
        }
        if let Some(n) = edit.next_file_number {
            self.next_file_number = n;
        }
        if let Some(n) = edit.last_sequence {
            self.last_sequence = n;
        }
        for (level, key) in edit.compact_pointers {
            self.compact_pointers.insert(level, key);
        }
        for (_level, number) in edit.deleted_files {
            self.deleted.insert(number);
        }
        for (level, meta) in edit.new_files {
            self.new_files.push((level, meta));
        }
    }

    /// Validates the accumulated state and produces the immutable version.
    ///
    /// # Errors
    ///
    /// - `UnsupportedComparator` if the descriptor names an ordering this
    ///   engine does not implement (or names none at all).
    /// - `Corruption` if any file's bounds are malformed or a level at or
    ///   above 1 contains overlapping ranges.
    pub fn finish(self) -> Result<Version> {
        let name = self.comparator.unwrap_or_default();
        let user_cmp = format::comparator::by_name(&name)
            .ok_or_else(|| Error::UnsupportedComparator(name.clone()))?;
        let cmp = InternalKeyComparator::new(user_cmp);

        let mut levels: [Vec<FileMetadata>; NUM_LEVELS] = Default::default();
        for (level, meta) in self.new_files {
            if self.deleted.contains(&meta.number) {
                continue;
            }
            levels[level as usize].push(meta);
        }

        // Level 0 is searched newest-first; deeper levels are partitioned
        // and kept sorted for binary search.
        levels[0].sort_by(|a, b| b.number.cmp(&a.number));
        for level_files in levels.iter_mut().skip(1) {
            level_files.sort_by(|a, b| cmp.compare(&a.smallest, &b.smallest));
        }

        let version = Version {
            cmp,
            levels,
            log_number: self.log_number,
            prev_log_number: self.prev_log_number,
            next_file_number: self.next_file_number,
            last_sequence: self.last_sequence,
            compact_pointers: self.compact_pointers,
        };
        version.check_invariants()?;
        Ok(version)
    }
}

/// The immutable set of live tables the database serves reads from.
pub struct Version {
    cmp: InternalKeyComparator,
    levels: [Vec<FileMetadata>; NUM_LEVELS],
    log_number: u64,
    prev_log_number: u64,
    next_file_number: u64,
    last_sequence: u64,
    compact_pointers: BTreeMap<u32, Vec<u8>>,
}

impl Version {
    /// The internal-key comparator the version's tables were written under.
    #[must_use]
    pub fn comparator(&self) -> InternalKeyComparator {
        self.cmp
    }

    /// Live files at `level`, in search order.
    #[must_use]
    pub fn level_files(&self, level: usize) -> &[FileMetadata] {
        &self.levels[level]
    }

    /// Total number of live table files.
    #[must_use]
    pub fn live_file_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Sequence number of the newest write the version reflects.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    #[must_use]
    pub fn log_number(&self) -> u64 {
        self.log_number
    }

    #[must_use]
    pub fn prev_log_number(&self) -> u64 {
        self.prev_log_number
    }

    #[must_use]
    pub fn next_file_number(&self) -> u64 {
        self.next_file_number
    }

    /// Tables that may hold `user_key`, in the order a lookup must try them:
    /// level 0 newest-first (ranges overlap), then each deeper level's single
    /// covering file.
    pub fn candidates<'a>(&'a self, user_key: &[u8]) -> Vec<&'a FileMetadata> {
        let user = self.cmp.user_comparator();
        let mut out = Vec::new();

        for file in &self.levels[0] {
            let (smallest, largest) = file.user_bounds();
            if user.compare(user_key, smallest) != Ordering::Less
                && user.compare(user_key, largest) != Ordering::Greater
            {
                out.push(file);
            }
        }

        for files in self.levels.iter().skip(1) {
            if files.is_empty() {
                continue;
            }
            // First file whose largest key reaches the target.
            let idx = files.partition_point(|f| {
                user.compare(f.user_bounds().1, user_key) == Ordering::Less
            });
            if idx < files.len() {
                let (smallest, _) = files[idx].user_bounds();
                if user.compare(user_key, smallest) != Ordering::Less {
                    out.push(&files[idx]);
                }
            }
        }
        out
    }

    /// Structural checks on the freshly built version: every file's bounds
    /// must be ordered internal keys, and partitioned levels must hold
    /// pairwise disjoint user-key ranges.
    fn check_invariants(&self) -> Result<()> {
        for (level, files) in self.levels.iter().enumerate() {
            for file in files {
                if file.smallest.len() < 8 || file.largest.len() < 8 {
                    return Err(Error::Corruption(format!(
                        "file {:06} has malformed key bounds",
                        file.number
                    )));
                }
                if self.cmp.compare(&file.smallest, &file.largest) == Ordering::Greater {
                    return Err(Error::Corruption(format!(
                        "file {:06} has inverted key bounds",
                        file.number
                    )));
                }
            }
            if level >= 1 {
                for pair in files.windows(2) {
                    let user = self.cmp.user_comparator();
                    let left_max = pair[0].user_bounds().1;
                    let right_min = pair[1].user_bounds().0;
                    if user.compare(left_max, right_min) != Ordering::Less {
                        return Err(Error::Corruption(format!(
                            "level {level} files {:06} and {:06} overlap",
                            pair[0].number, pair[1].number
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut level_counts = [0usize; NUM_LEVELS];
        for (i, files) in self.levels.iter().enumerate() {
            level_counts[i] = files.len();
        }
        f.debug_struct("Version")
            .field("comparator", &self.cmp)
            .field("levels", &level_counts)
            .field("log_number", &self.log_number)
            .field("prev_log_number", &self.prev_log_number)
            .field("next_file_number", &self.next_file_number)
            .field("last_sequence", &self.last_sequence)
            .field("compact_pointers", &self.compact_pointers.len())
            .finish()
    }
}
