//! # Format - Shared On-Disk Codecs
//!
//! The leaf crate of the StrataKV workspace. Everything here is a pure
//! function over byte slices: no I/O, no allocation beyond what the caller
//! asks for. The wal, sstable, and engine crates all build on these
//! primitives.
//!
//! ## Modules
//!
//! | Module           | Purpose                                                |
//! |------------------|--------------------------------------------------------|
//! | [`comparator`]   | Byte-ordering of user keys, selected by name            |
//! | [`span`]         | Cursor over a byte span: fixed ints, varints, prefixes  |
//! | [`crc`]          | Castagnoli CRC32C with the on-disk mask                 |
//! | [`internal_key`] | `user_key ‖ (sequence << 8 | type)` encoding & ordering |
//!
//! ## Wire conventions
//!
//! All fixed-width integers on disk are little-endian. Variable-length
//! integers are unsigned LEB128 (7 bits per byte, high bit = continuation,
//! at most 10 bytes for a `u64`). Byte strings are length-prefixed with a
//! varint.

pub mod comparator;
pub mod crc;
pub mod internal_key;
pub mod span;

pub use comparator::{by_name, BytewiseComparator, Comparator, BYTEWISE_NAME};
pub use internal_key::{InternalKeyComparator, ParsedInternalKey, ValueType};
pub use span::SpanReader;

use thiserror::Error;

/// Errors produced by the codecs in this crate.
///
/// Every variant is a structural violation of the on-disk format. Callers
/// higher in the stack surface these as corruption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The input ended before a complete field could be read.
    #[error("unexpected end of input reading {0}")]
    Truncated(&'static str),

    /// A varint used more than 10 bytes or overflowed 64 bits.
    #[error("varint does not fit in 64 bits")]
    VarintOverflow,

    /// A length-prefixed string was not valid UTF-8.
    #[error("length-prefixed string is not valid utf-8")]
    BadUtf8,

    /// An internal key was shorter than its 8-byte trailer.
    #[error("internal key shorter than the 8-byte trailer")]
    BadInternalKey,

    /// The value-type byte of an internal key was neither `Deletion` nor `Value`.
    #[error("unknown value type tag {0:#04x}")]
    BadValueType(u8),
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, FormatError>;
