//! # WAL - Block-Framed Record Log
//!
//! The framing shared by the descriptor log (`MANIFEST-*`) and the data log
//! (`*.log`): both are streams of variable-length records packed into fixed
//! 32 KiB blocks.
//!
//! ## Binary framing
//!
//! ```text
//! record:
//! ┌───────────────────┬───────────────┬──────────┬──────────────────┐
//! │ masked crc (4 LE) │ length (2 LE) │ type (1) │ payload (length) │
//! └───────────────────┴───────────────┴──────────┴──────────────────┘
//! ```
//!
//! The CRC is the masked Castagnoli checksum of `type ‖ payload`. A record
//! never straddles a block boundary: a payload too large for the space left
//! in the current block is split into `First`/`Middle`*/`Last` fragments,
//! each with its own header. A block tail shorter than the 7-byte header is
//! zero-filled and skipped; an all-zero header (`length = 0`, `type = 0`)
//! marks padding inside a block and ends it early.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{LogReader, LogWriter};
//!
//! let mut w = LogWriter::create("000003.log").unwrap();
//! w.append(b"first record").unwrap();
//! w.append(&vec![0xab; 100_000]).unwrap(); // spans several blocks
//! drop(w);
//!
//! let mut r = LogReader::open("000003.log").unwrap();
//! while let Some(payload) = r.read_record().unwrap() {
//!     println!("{} bytes", payload.len());
//! }
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use format::crc::masked_crc;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;

/// Size of a log block. Records never cross a block boundary.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Bytes of framing in front of every record fragment.
pub const HEADER_SIZE: usize = 7;

/// Fragment kinds a record can be stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// The whole record fits in one fragment.
    Full = 1,
    /// First fragment of a record that continues into later blocks.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Final fragment.
    Last = 4,
}

impl RecordType {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(RecordType::Full),
            2 => Ok(RecordType::First),
            3 => Ok(RecordType::Middle),
            4 => Ok(RecordType::Last),
            other => Err(WalError::BadRecordType(other)),
        }
    }
}

/// Errors produced while reading or writing the record log.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A fragment header claims more payload than the block holds.
    #[error("record header runs past the end of its block")]
    BadHeader,

    /// The stored CRC does not match the fragment contents.
    #[error("record checksum mismatch")]
    BadChecksum,

    /// The type byte names no known fragment kind.
    #[error("unknown record type {0}")]
    BadRecordType(u8),

    /// The log ended in the middle of a fragmented record or a fragment body.
    #[error("log truncated mid-record")]
    TruncatedRecord,

    /// A `Middle`/`Last` arrived with no open record, or a `First`/`Full`
    /// arrived while one was still open.
    #[error("unexpected continuation fragment")]
    UnexpectedContinuation,
}

/// Result alias for log operations.
pub type Result<T> = std::result::Result<T, WalError>;

/// Reads records back out of a block-framed log.
///
/// Generic over any [`Read`] implementor so tests can replay from an
/// in-memory buffer. Fragmented records are reassembled transparently;
/// every fragment's CRC is verified before its payload is used.
pub struct LogReader<R: Read> {
    rdr: R,
    block: Box<[u8; BLOCK_SIZE]>,
    /// Valid bytes in `block`; less than `BLOCK_SIZE` only for the final block.
    block_len: usize,
    pos: usize,
    exhausted: bool,
}

impl LogReader<File> {
    /// Opens a log file for sequential reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LogReader<File>> {
        Ok(LogReader::new(File::open(path)?))
    }
}

impl<R: Read> LogReader<R> {
    /// Wraps any byte stream positioned at a block boundary.
    pub fn new(rdr: R) -> Self {
        Self {
            rdr,
            block: Box::new([0u8; BLOCK_SIZE]),
            block_len: 0,
            pos: 0,
            exhausted: false,
        }
    }

    /// Returns the next user record, or `None` at a clean end of log.
    ///
    /// A corrupt fragment surfaces as an error; the reader does not skip it.
    /// Whether to stop or resynchronize is the caller's decision (descriptor
    /// replay stops).
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut scratch: Vec<u8> = Vec::new();
        let mut in_fragment = false;

        loop {
            let (kind, start, len) = match self.next_fragment()? {
                Some(f) => f,
                None => {
                    return if in_fragment {
                        Err(WalError::TruncatedRecord)
                    } else {
                        Ok(None)
                    };
                }
            };
            let payload = &self.block[start..start + len];

            match kind {
                RecordType::Full => {
                    if in_fragment {
                        return Err(WalError::UnexpectedContinuation);
                    }
                    return Ok(Some(payload.to_vec()));
                }
                RecordType::First => {
                    if in_fragment {
                        return Err(WalError::UnexpectedContinuation);
                    }
                    scratch.extend_from_slice(payload);
                    in_fragment = true;
                }
                RecordType::Middle => {
                    if !in_fragment {
                        return Err(WalError::UnexpectedContinuation);
                    }
                    scratch.extend_from_slice(payload);
                }
                RecordType::Last => {
                    if !in_fragment {
                        return Err(WalError::UnexpectedContinuation);
                    }
                    scratch.extend_from_slice(payload);
                    return Ok(Some(scratch));
                }
            }
        }
    }

    /// Replays every record, calling `apply` for each payload.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<()>
    where
        F: FnMut(Vec<u8>),
    {
        while let Some(payload) = self.read_record()? {
            apply(payload);
        }
        Ok(())
    }

    /// Parses the next physical fragment, refilling blocks as needed.
    /// Returns `(type, payload start, payload length)` into `self.block`.
    fn next_fragment(&mut self) -> Result<Option<(RecordType, usize, usize)>> {
        loop {
            if self.block_len - self.pos < HEADER_SIZE {
                // Zero-filled tail (or a partial header at true end of file);
                // records resume in the next block.
                if !self.refill()? {
                    return Ok(None);
                }
                continue;
            }

            let mut header = &self.block[self.pos..self.pos + HEADER_SIZE];
            let stored_crc = header.read_u32::<LittleEndian>()?;
            let length = header.read_u16::<LittleEndian>()? as usize;
            let tag = header[0];

            if stored_crc == 0 && length == 0 && tag == 0 {
                // Padding marker: the writer zero-filled the rest of this block.
                self.pos = self.block_len;
                continue;
            }

            let start = self.pos + HEADER_SIZE;
            if start + length > self.block_len {
                // A well-formed writer never overruns a full-size block; in a
                // short final block this is a torn tail write.
                return if self.block_len == BLOCK_SIZE {
                    Err(WalError::BadHeader)
                } else {
                    Err(WalError::TruncatedRecord)
                };
            }

            let kind = RecordType::from_tag(tag)?;
            if masked_crc(&[&[tag], &self.block[start..start + length]]) != stored_crc {
                return Err(WalError::BadChecksum);
            }

            self.pos = start + length;
            return Ok(Some((kind, start, length)));
        }
    }

    /// Reads the next block. Returns `false` at end of input.
    fn refill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.rdr.read(&mut self.block[filled..])?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }
        self.block_len = filled;
        self.pos = 0;
        Ok(filled >= HEADER_SIZE)
    }
}

/// Appends records to a block-framed log.
///
/// Payloads larger than the space left in the current block are split into
/// `First`/`Middle`/`Last` fragments; block tails too short for a header are
/// zero-filled. The writer tracks only its offset within the current block,
/// so it can resume a log whose final block is partially filled.
pub struct LogWriter<W: Write> {
    w: W,
    block_offset: usize,
}

impl LogWriter<File> {
    /// Creates (truncating) a log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<LogWriter<File>> {
        Ok(LogWriter::new(File::create(path)?))
    }

    /// Forces the log contents to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.w.flush()?;
        self.w.sync_all()?;
        Ok(())
    }
}

impl<W: Write> LogWriter<W> {
    /// Wraps a sink positioned at a block boundary.
    pub fn new(w: W) -> Self {
        Self { w, block_offset: 0 }
    }

    /// Wraps a sink positioned `offset` bytes into its current block.
    pub fn with_block_offset(w: W, offset: usize) -> Self {
        debug_assert!(offset < BLOCK_SIZE);
        Self {
            w,
            block_offset: offset,
        }
    }

    /// Appends one record, fragmenting across blocks as required.
    pub fn append(&mut self, payload: &[u8]) -> Result<()> {
        let mut rest = payload;
        let mut begin = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                // Not even a header fits; zero-fill and move to the next block.
                if leftover > 0 {
                    self.w.write_all(&[0u8; HEADER_SIZE - 1][..leftover])?;
                }
                self.block_offset = 0;
            }

            let available = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let take = rest.len().min(available);
            let end = take == rest.len();

            let kind = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };
            self.emit_fragment(kind, &rest[..take])?;

            rest = &rest[take..];
            begin = false;
            if end {
                return Ok(());
            }
        }
    }

    /// Flushes the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }

    /// Unwraps the sink, flushing first.
    pub fn into_inner(mut self) -> Result<W> {
        self.w.flush()?;
        Ok(self.w)
    }

    fn emit_fragment(&mut self, kind: RecordType, payload: &[u8]) -> Result<()> {
        let tag = kind as u8;
        self.w
            .write_u32::<LittleEndian>(masked_crc(&[&[tag], payload]))?;
        self.w.write_u16::<LittleEndian>(payload.len() as u16)?;
        self.w.write_u8(tag)?;
        self.w.write_all(payload)?;
        self.block_offset += HEADER_SIZE + payload.len();
        Ok(())
    }
}
