//! Block encoding: prefix-compressed entries with a restart array.
//!
//! Entries delta-encode their key against the previous entry. At every
//! restart point the full key is stored (`shared = 0`) and its offset is
//! appended to the restart array at the end of the block, so a seek can
//! binary-search the restarts and then scan at most one interval linearly.

use format::internal_key::InternalKeyComparator;
use format::span::{put_varint_u64, SpanReader};
use std::cmp::Ordering;

use crate::{Result, TableError};

/// How many entries share one restart point when building blocks.
pub const RESTART_INTERVAL: usize = 16;

/// A decoded block: entry region plus restart array.
pub struct Block {
    contents: Vec<u8>,
    /// End of the entry region / start of the restart array.
    restarts_offset: usize,
    num_restarts: usize,
}

impl Block {
    /// Validates the restart array and wraps the block contents.
    pub fn new(contents: Vec<u8>) -> Result<Self> {
        if contents.len() < 4 {
            return Err(TableError::TruncatedBlock);
        }
        let num_restarts =
            u32::from_le_bytes(contents[contents.len() - 4..].try_into().unwrap()) as usize;

        let array_bytes = num_restarts
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .ok_or(TableError::BadRestart)?;
        if array_bytes > contents.len() {
            return Err(TableError::BadRestart);
        }
        let restarts_offset = contents.len() - array_bytes;

        let block = Self {
            contents,
            restarts_offset,
            num_restarts,
        };
        // Every restart offset must point inside the entry region.
        for i in 0..block.num_restarts {
            if block.restart(i) > block.restarts_offset {
                return Err(TableError::BadRestart);
            }
        }
        Ok(block)
    }

    /// Number of restart points.
    #[must_use]
    pub fn num_restarts(&self) -> usize {
        self.num_restarts
    }

    /// An iterator positioned before the first entry.
    #[must_use]
    pub fn iter<'a>(&'a self, cmp: &InternalKeyComparator) -> BlockIter<'a> {
        BlockIter {
            block: self,
            cmp: *cmp,
            offset: 0,
            key: Vec::new(),
            value: 0..0,
            valid: false,
        }
    }

    fn restart(&self, i: usize) -> usize {
        let at = self.restarts_offset + 4 * i;
        u32::from_le_bytes(self.contents[at..at + 4].try_into().unwrap()) as usize
    }

    fn entry_region(&self) -> &[u8] {
        &self.contents[..self.restarts_offset]
    }
}

/// Cursor over the entries of one block.
///
/// After a successful [`seek`](BlockIter::seek) the iterator sits on the
/// first entry whose key is `>=` the target under internal-key ordering, or
/// is invalid if no such entry exists.
pub struct BlockIter<'a> {
    block: &'a Block,
    cmp: InternalKeyComparator,
    /// Byte offset of the *next* entry to decode.
    offset: usize,
    key: Vec<u8>,
    value: std::ops::Range<usize>,
    valid: bool,
}

impl<'a> BlockIter<'a> {
    /// True when the iterator sits on an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// The current entry's full internal key.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        debug_assert!(self.valid);
        &self.key
    }

    /// The current entry's value.
    #[must_use]
    pub fn value(&self) -> &'a [u8] {
        debug_assert!(self.valid);
        &self.block.contents[self.value.clone()]
    }

    /// Positions on the first entry with key `>=` target.
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        // Binary search: greatest restart whose (full) key is < target.
        let mut left = 0usize;
        let mut right = self.block.num_restarts.saturating_sub(1);
        while left < right {
            let mid = (left + right + 1) / 2;
            let mid_key = self.restart_key(mid)?;
            if self.cmp.compare(&mid_key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart(left);
        loop {
            if !self.step()? {
                return Ok(()); // ran off the end; iterator left invalid
            }
            if self.cmp.compare(&self.key, target) != Ordering::Less {
                return Ok(());
            }
        }
    }

    /// Positions on the first entry of the block.
    pub fn seek_to_first(&mut self) -> Result<()> {
        self.seek_to_restart(0);
        self.step()?;
        Ok(())
    }

    /// Advances to the next entry. Returns `false` at the end of the block.
    pub fn next(&mut self) -> Result<bool> {
        debug_assert!(self.valid);
        self.step()
    }

    fn seek_to_restart(&mut self, i: usize) {
        self.offset = if self.block.num_restarts == 0 {
            self.block.restarts_offset
        } else {
            self.block.restart(i)
        };
        self.key.clear();
        self.valid = false;
    }

    /// Decodes the full key stored at restart `i` without moving the cursor.
    fn restart_key(&self, i: usize) -> Result<Vec<u8>> {
        let region = self.block.entry_region();
        let mut rdr = SpanReader::new(&region[self.block.restart(i)..]);
        let shared = rdr.read_varint_u64()?;
        if shared != 0 {
            // A restart must store its key in full.
            return Err(TableError::BadRestart);
        }
        let non_shared = rdr.read_varint_u64()? as usize;
        let _value_len = rdr.read_varint_u64()?;
        if rdr.remaining() < non_shared {
            return Err(TableError::TruncatedBlock);
        }
        let mut key = Vec::with_capacity(non_shared);
        let at = self.block.restart(i) + rdr.position();
        key.extend_from_slice(&region[at..at + non_shared]);
        Ok(key)
    }

    /// Decodes the entry at `self.offset` into `key`/`value`.
    fn step(&mut self) -> Result<bool> {
        let region = self.block.entry_region();
        if self.offset >= region.len() {
            self.valid = false;
            return Ok(false);
        }

        let mut rdr = SpanReader::new(&region[self.offset..]);
        let shared = rdr.read_varint_u64()? as usize;
        let non_shared = rdr.read_varint_u64()? as usize;
        let value_len = rdr.read_varint_u64()? as usize;

        if shared > self.key.len() {
            // The delta chain is broken relative to the restart we came from.
            return Err(TableError::BadRestart);
        }
        if rdr.remaining() < non_shared + value_len {
            return Err(TableError::TruncatedBlock);
        }

        let delta_at = self.offset + rdr.position();
        self.key.truncate(shared);
        self.key.extend_from_slice(&region[delta_at..delta_at + non_shared]);

        let value_at = delta_at + non_shared;
        self.value = value_at..value_at + value_len;
        self.offset = value_at + value_len;
        self.valid = true;
        Ok(true)
    }
}

/// Builds the serialized form of one block.
///
/// Keys must be appended in ascending order; the builder delta-encodes each
/// against its predecessor and records a restart every `restart_interval`
/// entries.
pub struct BlockBuilder {
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    restart_interval: usize,
    counter: usize,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    #[must_use]
    pub fn new(restart_interval: usize) -> Self {
        debug_assert!(restart_interval >= 1);
        Self {
            buffer: Vec::new(),
            restarts: Vec::new(),
            restart_interval,
            counter: 0,
            last_key: Vec::new(),
        }
    }

    /// Appends one entry. `key` must sort after every key added so far.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        let shared = if self.counter % self.restart_interval == 0 {
            self.restarts.push(self.buffer.len() as u32);
            0
        } else {
            shared_prefix_len(&self.last_key, key)
        };

        put_varint_u64(&mut self.buffer, shared as u64);
        put_varint_u64(&mut self.buffer, (key.len() - shared) as u64);
        put_varint_u64(&mut self.buffer, value.len() as u64);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
    }

    /// Serialized size so far, including the restart array to come.
    #[must_use]
    pub fn size_estimate(&self) -> usize {
        self.buffer.len() + 4 * self.restarts.len() + 4
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }

    /// Appends the restart array and returns the finished block contents.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        for &r in &self.restarts {
            self.buffer.extend_from_slice(&r.to_le_bytes());
        }
        self.buffer
            .extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        self.buffer
    }
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let max = a.len().min(b.len());
    let mut i = 0;
    while i < max && a[i] == b[i] {
        i += 1;
    }
    i
}
