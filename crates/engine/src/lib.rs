//! # Engine - StrataKV Database Façade
//!
//! Wires the [`wal`], [`sstable`], and [`format`] crates into a read-only
//! key-value store over a quiesced LevelDB-format directory, as written by
//! Bedrock-edition world storage.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                   DATABASE                       │
//! │                                                  │
//! │ open:  CURRENT → MANIFEST-NNNNNN                 │
//! │          |  (wal::LogReader framing)             │
//! │          v                                       │
//! │        VersionEdit* → Version                    │
//! │          (live tables per level + counters)      │
//! │                                                  │
//! │ get:   Version → candidate tables, L0 first      │
//! │          |                                       │
//! │          v                                       │
//! │        TableCache (readers pinned by file no.)   │
//! │          |                                       │
//! │          v                                       │
//! │        TableReader::get → Found/Deleted/NotFound │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module       | Purpose                                             |
//! |--------------|-----------------------------------------------------|
//! | [`lib.rs`]   | `Database` struct, open/close, accessors, `Debug`   |
//! | [`manifest`] | `CURRENT` resolution, descriptor replay             |
//! | [`version`]  | `VersionEdit` codec, live-file state, level search  |
//! | [`cache`]    | Lazily opened table readers keyed by file number    |
//! | [`read`]     | `get()` routing and the `GetOutcome` result state   |
//! | [`error`]    | The engine-boundary error type                      |
//!
//! ## Levels
//!
//! ```text
//! ┌────────────────────────────┐  ← newest data, checked first
//! │ L0 tables (may overlap)    │    searched newest-first
//! ├────────────────────────────┤
//! │ L1..L6 tables              │    partitioned, binary-searched
//! └────────────────────────────┘
//! ```
//!
//! The engine never mutates the directory. Everything it serves was
//! installed by whatever wrote the database; one immutable [`Version`] is
//! built at open and answers every lookup thereafter.

mod cache;
mod error;
mod manifest;
mod read;
mod version;

pub use cache::{table_file_name, TableCache};
pub use error::{Error, Result};
pub use manifest::{load_version, read_current, CURRENT_FILENAME};
pub use read::GetOutcome;
pub use version::{FileMetadata, Version, VersionBuilder, VersionEdit, NUM_LEVELS};

use std::path::{Path, PathBuf};

/// A read-only database over one on-disk directory.
///
/// Cheap to share by reference: `get` takes `&self`, and the only interior
/// mutation is the table cache's insert lock. Concurrent lookups on one
/// `Database` are safe.
pub struct Database {
    dir: PathBuf,
    version: Version,
    cache: TableCache,
}

impl Database {
    /// Opens the database in `dir`: resolves `CURRENT`, replays the
    /// descriptor log, and validates the resulting version. Table readers
    /// are opened lazily on first touch.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `dir` is not a directory.
    /// - `Io` if `CURRENT` or the manifest is missing or unreadable.
    /// - `Corruption` / `UnsupportedComparator` from descriptor replay.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let version = manifest::load_version(&dir)?;
        let cache = TableCache::new(dir.clone(), version.comparator());

        tracing::debug!(
            dir = %dir.display(),
            live_files = version.live_file_count(),
            last_sequence = version.last_sequence(),
            "opened database"
        );
        Ok(Self {
            dir,
            version,
            cache,
        })
    }

    /// The directory this database was opened from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The immutable version installed at open.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// The table-reader cache.
    #[must_use]
    pub(crate) fn table_cache(&self) -> &TableCache {
        &self.cache
    }

    /// Number of table readers currently open.
    #[must_use]
    pub fn open_table_count(&self) -> usize {
        self.cache.len()
    }

    /// Releases every cached table reader.
    ///
    /// Dropping the `Database` does the same; `close` exists for callers
    /// that want the descriptors gone at a deterministic point.
    pub fn close(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dir", &self.dir)
            .field("version", &self.version)
            .field("open_tables", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
