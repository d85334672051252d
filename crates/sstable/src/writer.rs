//! Table writer.
//!
//! Produces files the [`TableReader`](crate::TableReader) accepts. The
//! engine's read path never writes tables; this exists so tests and tooling
//! can construct real fixtures, and it follows the same atomic
//! temp-file-then-rename discipline as the rest of the workspace.

use byteorder::{LittleEndian, WriteBytesExt};
use format::crc::masked_crc;
use format::internal_key::InternalKeyComparator;
use std::cmp::Ordering;
use std::fs::{rename, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::block::{BlockBuilder, RESTART_INTERVAL};
use crate::footer::{BlockHandle, CompressionType, Footer};
use crate::Result;

/// Target uncompressed size of a data block before it is cut.
const BLOCK_TARGET: usize = 4 * 1024;

/// Streams sorted internal-key/value pairs into a table file.
pub struct TableWriter {
    tmp_path: PathBuf,
    path: PathBuf,
    file: File,
    cmp: InternalKeyComparator,
    offset: u64,
    block: BlockBuilder,
    /// Index entries for finished data blocks: (last key, handle).
    index_entries: Vec<(Vec<u8>, BlockHandle)>,
    last_key: Vec<u8>,
    num_entries: u64,
}

impl TableWriter {
    /// Creates a writer targeting `path`. The file appears there only after
    /// a successful [`finish`](TableWriter::finish).
    pub fn create<P: AsRef<Path>>(path: P, cmp: InternalKeyComparator) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = path.with_extension("ldb.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        Ok(Self {
            tmp_path,
            path,
            file,
            cmp,
            offset: 0,
            block: BlockBuilder::new(RESTART_INTERVAL),
            index_entries: Vec::new(),
            last_key: Vec::new(),
            num_entries: 0,
        })
    }

    /// Appends one record.
    ///
    /// # Panics
    ///
    /// Keys must arrive in strictly ascending internal-key order; anything
    /// else is a caller bug, not an I/O condition.
    pub fn add(&mut self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        assert!(
            self.num_entries == 0
                || self.cmp.compare(internal_key, &self.last_key) == Ordering::Greater,
            "keys added out of order"
        );

        self.block.add(internal_key, value);
        self.last_key.clear();
        self.last_key.extend_from_slice(internal_key);
        self.num_entries += 1;

        if self.block.size_estimate() >= BLOCK_TARGET {
            self.cut_block()?;
        }
        Ok(())
    }

    /// Records appended so far.
    #[must_use]
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Writes the index block and footer, syncs, and moves the file into
    /// place. Returns the final file size.
    pub fn finish(mut self) -> Result<u64> {
        if !self.block.is_empty() {
            self.cut_block()?;
        }

        // Metaindex: present but empty (no filter blocks yet).
        let metaindex = self.write_raw_block(BlockBuilder::new(RESTART_INTERVAL).finish())?;

        // Index block: every entry is a restart so lookups can bisect freely.
        let mut index = BlockBuilder::new(1);
        let mut handle_scratch = Vec::new();
        for (last_key, handle) in &self.index_entries {
            handle_scratch.clear();
            handle.encode_to(&mut handle_scratch);
            index.add(last_key, &handle_scratch);
        }
        let index_handle = self.write_raw_block(index.finish())?;

        let footer = Footer {
            metaindex,
            index: index_handle,
        }
        .encode();
        self.file.write_all(&footer)?;
        self.file.flush()?;
        self.file.sync_all()?;
        let size = self.offset + footer.len() as u64;

        rename(&self.tmp_path, &self.path)?;
        Ok(size)
    }

    fn cut_block(&mut self) -> Result<()> {
        let block = std::mem::replace(&mut self.block, BlockBuilder::new(RESTART_INTERVAL));
        let handle = self.write_raw_block(block.finish())?;
        self.index_entries.push((self.last_key.clone(), handle));
        Ok(())
    }

    /// Writes `contents ‖ trailer` and returns the block's handle.
    fn write_raw_block(&mut self, contents: Vec<u8>) -> Result<BlockHandle> {
        let handle = BlockHandle {
            offset: self.offset,
            size: contents.len() as u64,
        };
        let tag = CompressionType::None as u8;
        self.file.write_all(&contents)?;
        self.file.write_u8(tag)?;
        self.file
            .write_u32::<LittleEndian>(masked_crc(&[contents.as_slice(), &[tag]]))?;
        self.offset += contents.len() as u64 + crate::footer::BLOCK_TRAILER_SIZE as u64;
        Ok(handle)
    }
}
