//! Footer, block handles, and block trailer constants.

use format::span::{put_varint_u64, SpanReader};

use crate::{Result, TableError};

/// Magic number at the very end of every table file.
pub const TABLE_MAGIC: u64 = 0xdb47_7524_8b80_fb57;

/// The footer always occupies the last 48 bytes of the file.
pub const FOOTER_SIZE: usize = 48;

/// Compression tag plus masked CRC appended to every block on disk.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Two varint64s occupy at most 20 bytes.
const MAX_ENCODED_HANDLE: usize = 20;

/// A contiguous byte range inside a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    /// Decodes `offset ‖ size` varints from the cursor.
    pub fn decode(rdr: &mut SpanReader<'_>) -> Result<Self> {
        let offset = rdr.read_varint_u64()?;
        let size = rdr.read_varint_u64()?;
        Ok(Self { offset, size })
    }

    /// Appends the varint encoding to `buf`.
    pub fn encode_to(&self, buf: &mut Vec<u8>) {
        put_varint_u64(buf, self.offset);
        put_varint_u64(buf, self.size);
    }
}

/// How a block's payload is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
    Zstd = 2,
}

impl CompressionType {
    /// Decodes the trailer tag. Tags outside the known set are corruption;
    /// known-but-undecoded codecs are rejected later with a clearer error.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Snappy),
            2 => Ok(CompressionType::Zstd),
            _ => Err(TableError::BadBlockTrailer),
        }
    }
}

/// The fixed-size footer naming the metaindex and index blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub metaindex: BlockHandle,
    pub index: BlockHandle,
}

impl Footer {
    /// Decodes the last [`FOOTER_SIZE`] bytes of a file.
    ///
    /// The magic is checked first so that a file of the wrong format fails
    /// with [`TableError::BadMagic`] rather than a varint error.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() != FOOTER_SIZE {
            return Err(TableError::TooSmall);
        }
        let magic = u64::from_le_bytes(raw[FOOTER_SIZE - 8..].try_into().unwrap());
        if magic != TABLE_MAGIC {
            return Err(TableError::BadMagic);
        }

        let mut rdr = SpanReader::new(&raw[..FOOTER_SIZE - 8]);
        let metaindex = BlockHandle::decode(&mut rdr)?;
        let index = BlockHandle::decode(&mut rdr)?;
        // Bytes between the handles and the magic are zero padding.
        Ok(Self { metaindex, index })
    }

    /// Produces the on-disk footer bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut handles = Vec::with_capacity(2 * MAX_ENCODED_HANDLE);
        self.metaindex.encode_to(&mut handles);
        self.index.encode_to(&mut handles);

        let mut out = [0u8; FOOTER_SIZE];
        out[..handles.len()].copy_from_slice(&handles);
        out[FOOTER_SIZE - 8..].copy_from_slice(&TABLE_MAGIC.to_le_bytes());
        out
    }
}
