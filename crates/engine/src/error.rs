//! Engine-level error type.
//!
//! The lower crates keep their own precise error enums; at the database
//! boundary they collapse into the handful of kinds a caller can act on.
//! `NotFound` and `Deleted` are deliberately *not* here — they are result
//! states of a lookup, not failures.

use sstable::TableError;
use std::io;
use thiserror::Error;
use wal::WalError;

/// Errors surfaced by [`Database`](crate::Database) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying file read failed, including a table file the manifest
    /// references but the directory does not contain.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A structural violation of the on-disk format.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The database was written under an ordering this engine does not
    /// implement.
    #[error("unsupported comparator {0:?}")]
    UnsupportedComparator(String),

    /// A block is compressed with a codec this build does not decode.
    #[error("unsupported compression type {0}")]
    UnsupportedCompression(u8),

    /// The caller handed us something unusable, e.g. an empty key.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<TableError> for Error {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Io(e) => Error::Io(e),
            TableError::UnsupportedCompression(tag) => Error::UnsupportedCompression(tag),
            other => Error::Corruption(other.to_string()),
        }
    }
}

impl From<WalError> for Error {
    fn from(err: WalError) -> Self {
        match err {
            WalError::Io(e) => Error::Io(e),
            other => Error::Corruption(other.to_string()),
        }
    }
}

impl From<format::FormatError> for Error {
    fn from(err: format::FormatError) -> Self {
        Error::Corruption(err.to_string())
    }
}
