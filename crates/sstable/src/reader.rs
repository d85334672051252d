//! Point-lookup reader for a single table file.

use byteorder::{LittleEndian, ReadBytesExt};
use format::crc::masked_crc;
use format::internal_key::{lookup_key, InternalKeyComparator, ParsedInternalKey, ValueType};
use format::span::SpanReader;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::block::Block;
use crate::footer::{BlockHandle, CompressionType, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE};
use crate::{Result, TableError};

/// One record found by a lookup. `value: None` is a deletion tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub sequence: u64,
    pub value: Option<Vec<u8>>,
}

/// Reads one `.ldb` table file for point lookups.
///
/// On [`open`](TableReader::open) the footer is validated and the index
/// block is decoded and pinned in memory. Each `get` then costs one seek and
/// one checksummed block read.
///
/// The file handle persists for the reader's lifetime behind a `Mutex`, so
/// `get` works through a shared `&self` and concurrent callers serialize on
/// the single descriptor.
pub struct TableReader {
    /// Path the table was opened from (kept for diagnostics).
    #[allow(dead_code)]
    path: PathBuf,
    file: Mutex<File>,
    file_size: u64,
    index: Block,
    cmp: InternalKeyComparator,
}

impl TableReader {
    /// Opens a table file and loads its index block.
    ///
    /// # Errors
    ///
    /// - [`TableError::TooSmall`] if the file cannot hold a footer.
    /// - [`TableError::BadMagic`] if the trailing magic number mismatches.
    /// - [`TableError::BadBlockChecksum`] if the index block is corrupt.
    pub fn open<P: AsRef<Path>>(path: P, cmp: InternalKeyComparator) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();

        if file_size < FOOTER_SIZE as u64 {
            return Err(TableError::TooSmall);
        }
        file.seek(SeekFrom::Start(file_size - FOOTER_SIZE as u64))?;
        let mut raw = [0u8; FOOTER_SIZE];
        file.read_exact(&mut raw)?;
        let footer = Footer::decode(&raw)?;

        let index = Block::new(read_block(&mut file, file_size, footer.index)?)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            file_size,
            index,
            cmp,
        })
    }

    /// Looks up the newest record for `user_key` in this table.
    ///
    /// Returns `Ok(None)` when the table holds no record for the key; a
    /// returned [`TableEntry`] may still be a tombstone. The data block the
    /// index points at is checksum-verified before any entry is decoded.
    pub fn get(&self, user_key: &[u8]) -> Result<Option<TableEntry>> {
        let probe = lookup_key(user_key);

        // Index entries carry the last key of their data block, so the first
        // index entry >= probe names the only block that can hold the key.
        let mut index_iter = self.index.iter(&self.cmp);
        index_iter.seek(&probe)?;
        if !index_iter.valid() {
            return Ok(None);
        }
        let handle = BlockHandle::decode(&mut SpanReader::new(index_iter.value()))?;

        let contents = {
            let mut file = self
                .file
                .lock()
                .map_err(|_| TableError::Io(std::io::Error::other("table file lock poisoned")))?;
            read_block(&mut file, self.file_size, handle)?
        };
        let block = Block::new(contents)?;

        let mut iter = block.iter(&self.cmp);
        iter.seek(&probe)?;
        if !iter.valid() {
            return Ok(None);
        }

        let parsed = ParsedInternalKey::parse(iter.key())?;
        if parsed.user_key != user_key {
            return Ok(None);
        }
        Ok(Some(match parsed.value_type {
            ValueType::Value => TableEntry {
                sequence: parsed.sequence,
                value: Some(iter.value().to_vec()),
            },
            ValueType::Deletion => TableEntry {
                sequence: parsed.sequence,
                value: None,
            },
        }))
    }
}

/// Reads and verifies one block named by `handle`.
///
/// The five trailer bytes after the block are `compression type ‖ masked
/// CRC32C of (data ‖ type)`. Only uncompressed blocks are decoded; snappy
/// and zstd tags fail with [`TableError::UnsupportedCompression`].
fn read_block(file: &mut File, file_size: u64, handle: BlockHandle) -> Result<Vec<u8>> {
    let end = handle
        .offset
        .checked_add(handle.size)
        .and_then(|e| e.checked_add(BLOCK_TRAILER_SIZE as u64))
        .ok_or(TableError::TruncatedBlock)?;
    if end > file_size {
        return Err(TableError::TruncatedBlock);
    }

    file.seek(SeekFrom::Start(handle.offset))?;
    let mut data = vec![0u8; handle.size as usize];
    file.read_exact(&mut data)?;
    let compression_tag = file.read_u8()?;
    let stored_crc = file.read_u32::<LittleEndian>()?;

    if masked_crc(&[data.as_slice(), &[compression_tag]]) != stored_crc {
        return Err(TableError::BadBlockChecksum);
    }

    match CompressionType::from_tag(compression_tag)? {
        CompressionType::None => Ok(data),
        CompressionType::Snappy | CompressionType::Zstd => {
            Err(TableError::UnsupportedCompression(compression_tag))
        }
    }
}
