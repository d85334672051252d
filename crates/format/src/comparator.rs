//! User-key comparators.
//!
//! The database stores the comparator's name in its descriptor log and
//! refuses to open under a different ordering, so the name is part of the
//! on-disk contract. Dispatch stays behind the [`Comparator`] trait so that
//! additional orderings (reverse-bytewise, for instance) can be registered
//! in [`by_name`] without touching any call site.

use std::cmp::Ordering;

/// Name the bytewise comparator registers under. Must match the descriptor
/// log of any database this engine opens.
pub const BYTEWISE_NAME: &str = "leveldb.BytewiseComparator";

/// A total order over user keys.
pub trait Comparator: Send + Sync {
    /// The name persisted in the descriptor log.
    fn name(&self) -> &'static str;

    /// Compares two user keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Plain lexicographic byte ordering: shorter-is-less on an equal prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        BYTEWISE_NAME
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Looks up a comparator by its persisted name.
///
/// Returns `None` for names this engine does not implement; the caller
/// decides whether that is an error (the engine treats it as one).
pub fn by_name(name: &str) -> Option<&'static dyn Comparator> {
    match name {
        BYTEWISE_NAME => Some(&BytewiseComparator),
        _ => None,
    }
}
