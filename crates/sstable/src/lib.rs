//! # SSTable - Sorted-Table Files
//!
//! Immutable, on-disk table files (`*.ldb`) holding internal-key/value
//! records in sorted order. Tables are *write-once, read-many*: the engine
//! only ever reads them, and the [`TableWriter`] here exists to produce
//! bit-compatible fixtures.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DATA BLOCKS (prefix-compressed entries, ~4 KiB each)          │
//! │                                                               │
//! │ entry: shared (varint) | non_shared (varint) | val_len        │
//! │        (varint) | key delta | value                           │
//! │ block: entries ‖ restarts[n] (u32 LE each) ‖ n (u32 LE)       │
//! │ on disk each block is followed by:                            │
//! │        compression type (1) ‖ masked crc32c (4 LE)            │
//! ├───────────────────────────────────────────────────────────────┤
//! │ METAINDEX BLOCK (empty; reserved for filter metadata)         │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX BLOCK (one entry per data block:                        │
//! │              last internal key -> encoded block handle)       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 48 bytes)                                 │
//! │                                                               │
//! │ metaindex handle ‖ index handle ‖ zero padding ‖              │
//! │ magic 0xdb4775248b80fb57 (u64 LE)                             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys inside a block share prefixes with their predecessor; every
//! `RESTART_INTERVAL` entries the full key is stored and its offset recorded
//! in the restart array, which is what makes in-block binary search
//! possible. The block checksum covers `data ‖ compression type`.

mod block;
mod footer;
mod reader;
mod writer;

pub use block::{Block, BlockBuilder, BlockIter};
pub use footer::{
    BlockHandle, CompressionType, Footer, BLOCK_TRAILER_SIZE, FOOTER_SIZE, TABLE_MAGIC,
};
pub use reader::{TableEntry, TableReader};
pub use writer::TableWriter;

use format::FormatError;
use std::io;
use thiserror::Error;

/// Errors produced while opening or searching a table file.
#[derive(Debug, Error)]
pub enum TableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file is smaller than a footer.
    #[error("file too small to hold a table footer")]
    TooSmall,

    /// The footer magic number does not match.
    #[error("bad table magic number")]
    BadMagic,

    /// A block's stored checksum does not match its contents.
    #[error("block checksum mismatch")]
    BadBlockChecksum,

    /// A block trailer carries an unintelligible compression tag.
    #[error("malformed block trailer")]
    BadBlockTrailer,

    /// A block or entry runs past the bytes that exist.
    #[error("block contents truncated")]
    TruncatedBlock,

    /// The restart array is inconsistent with the block contents.
    #[error("malformed restart array")]
    BadRestart,

    /// The block is compressed with a codec this build does not decode.
    #[error("unsupported compression type {0}")]
    UnsupportedCompression(u8),

    /// A key or field inside the block failed to decode.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Result alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

#[cfg(test)]
mod tests;
