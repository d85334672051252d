//! Point-lookup routing across levels.

use crate::error::{Error, Result};
use crate::Database;

/// Outcome of a point lookup.
///
/// `Deleted` is distinct from `NotFound`: a tombstone was found, so the key
/// is logically absent even if older levels still hold a value for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    /// The newest record for the key is a live value.
    Found(Vec<u8>),
    /// The newest record for the key is a deletion tombstone.
    Deleted,
    /// No level holds any record for the key.
    NotFound,
}

impl Database {
    /// Looks up `user_key`, trying candidate tables shallowest level first.
    ///
    /// Within level 0 the newest table is tried first, so a fresher record
    /// always shadows a staler one; the first table that yields either a
    /// value or a tombstone settles the answer.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty key.
    /// - Corruption detected on any candidate table propagates rather than
    ///   being skipped: a skipped table could hide a tombstone and resurrect
    ///   a stale value from a deeper level.
    pub fn get(&self, user_key: &[u8]) -> Result<GetOutcome> {
        if user_key.is_empty() {
            return Err(Error::InvalidArgument("empty key".to_string()));
        }

        for file in self.version().candidates(user_key) {
            let table = self.table_cache().table(file.number)?;
            match table.get(user_key)? {
                Some(entry) => {
                    return Ok(match entry.value {
                        Some(value) => GetOutcome::Found(value),
                        None => GetOutcome::Deleted,
                    });
                }
                None => continue,
            }
        }
        Ok(GetOutcome::NotFound)
    }
}
