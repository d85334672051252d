//! Descriptor resolution and replay.
//!
//! `CURRENT` is a one-line text file naming the active `MANIFEST-NNNNNN`
//! descriptor log. Replaying that log through the shared record framing
//! yields the version the database serves from.

use std::fs;
use std::path::Path;

use wal::{LogReader, WalError};

use crate::error::{Error, Result};
use crate::version::{Version, VersionBuilder, VersionEdit};

/// Name of the pointer file in the database directory.
pub const CURRENT_FILENAME: &str = "CURRENT";

/// Reads `CURRENT` and returns the descriptor file name it points at.
pub fn read_current(dir: &Path) -> Result<String> {
    let raw = fs::read_to_string(dir.join(CURRENT_FILENAME))?;
    let name = raw.trim_end_matches(['\r', '\n']);
    if name.is_empty() || !name.starts_with("MANIFEST-") || name.contains('/') {
        return Err(Error::Corruption(format!(
            "CURRENT does not name a manifest: {name:?}"
        )));
    }
    Ok(name.to_string())
}

/// Replays the descriptor log named by `CURRENT` into a [`Version`].
///
/// Replay is the one place with local error recovery: a framing error in
/// the descriptor stream is treated as the log's tail (a torn final write)
/// and replay stops with the edits accumulated so far. An edit that *parses*
/// wrongly — an unknown tag, a malformed field — still fails the open, as
/// does a comparator this engine does not implement.
pub fn load_version(dir: &Path) -> Result<Version> {
    let name = read_current(dir)?;
    let path = dir.join(&name);
    let mut reader = match LogReader::open(&path) {
        Ok(r) => r,
        Err(WalError::Io(e)) => return Err(Error::Io(e)),
        Err(e) => return Err(e.into()),
    };

    let mut builder = VersionBuilder::new();
    let mut edits = 0usize;
    loop {
        match reader.read_record() {
            Ok(Some(payload)) => {
                builder.apply(VersionEdit::decode(&payload)?);
                edits += 1;
            }
            Ok(None) => break,
            Err(WalError::Io(e)) => return Err(Error::Io(e)),
            Err(e) => {
                tracing::warn!(
                    manifest = %name,
                    error = %e,
                    edits,
                    "descriptor log ends in a corrupt record; keeping edits read so far"
                );
                break;
            }
        }
    }

    let version = builder.finish()?;
    tracing::debug!(manifest = %name, edits, version = ?version, "replayed descriptor log");
    Ok(version)
}
