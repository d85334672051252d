//! Table-reader cache.
//!
//! Readers are opened lazily on first use and pinned for the database
//! lifetime, keyed by the primitive file number (never by pointers into the
//! version, which keeps the manifest and the readers from referencing each
//! other). Concurrent lookups share readers through `Arc`s behind an
//! `RwLock`; the write lock is held only for the insert itself.

use format::internal_key::InternalKeyComparator;
use sstable::TableReader;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Lazily opened, pinned table readers for one database directory.
pub struct TableCache {
    dir: PathBuf,
    cmp: InternalKeyComparator,
    readers: RwLock<HashMap<u64, Arc<TableReader>>>,
}

impl TableCache {
    #[must_use]
    pub fn new(dir: PathBuf, cmp: InternalKeyComparator) -> Self {
        Self {
            dir,
            cmp,
            readers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the reader for `number`, opening it on first use.
    ///
    /// # Errors
    ///
    /// `Io` if the file is missing (neither `.ldb` nor legacy `.sst`
    /// exists), `Corruption` if it fails table validation.
    pub fn table(&self, number: u64) -> Result<Arc<TableReader>> {
        if let Some(reader) = self.lock_read()?.get(&number) {
            return Ok(Arc::clone(reader));
        }

        let reader = Arc::new(TableReader::open(self.table_path(number), self.cmp)?);
        let mut map = self.lock_write()?;
        // A racing opener may have inserted while we were off the lock;
        // keep the first one so every caller shares a single reader.
        Ok(Arc::clone(map.entry(number).or_insert(reader)))
    }

    /// Drops every cached reader, closing the underlying files.
    pub fn clear(&self) {
        if let Ok(mut map) = self.readers.write() {
            map.clear();
        }
    }

    /// Number of readers currently open.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.read().map(|m| m.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{number:06}.ldb`, falling back to the legacy `.sst` suffix when only
    /// that exists. A missing file resolves to the `.ldb` name so the open
    /// fails with the name the manifest implies.
    fn table_path(&self, number: u64) -> PathBuf {
        let ldb = self.dir.join(table_file_name(number, "ldb"));
        if ldb.exists() {
            return ldb;
        }
        let sst = self.dir.join(table_file_name(number, "sst"));
        if sst.exists() {
            return sst;
        }
        ldb
    }

    fn lock_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<u64, Arc<TableReader>>>> {
        self.readers.read().map_err(|_| poisoned())
    }

    fn lock_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<u64, Arc<TableReader>>>> {
        self.readers.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::Io(io::Error::other("table cache lock poisoned"))
}

/// Formats a table file name: zero-padded six-digit number plus suffix.
#[must_use]
pub fn table_file_name(number: u64, extension: &str) -> String {
    format!("{number:06}.{extension}")
}
