//! Internal-key encoding and ordering.
//!
//! Every record in a table file is keyed by an *internal key*: the user key
//! followed by an 8-byte little-endian trailer packing a 56-bit sequence
//! number and an 8-bit value type. Internal keys order by user key
//! ascending, then by trailer **descending** — so the newest record for a
//! user key sorts first, which is what lets a point lookup stop at the first
//! matching entry.

use std::cmp::Ordering;

use crate::comparator::Comparator;
use crate::{FormatError, Result};

/// Width of the sequence/type trailer.
pub const TRAILER_SIZE: usize = 8;

/// Largest sequence number the 56-bit field can carry.
pub const MAX_SEQUENCE: u64 = (1 << 56) - 1;

/// The record kinds the read path recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    /// A deletion tombstone; the key is logically absent at this sequence.
    Deletion = 0x00,
    /// A live value.
    Value = 0x01,
}

impl ValueType {
    /// Decodes the on-disk tag. Unknown tags are corruption.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x00 => Ok(ValueType::Deletion),
            0x01 => Ok(ValueType::Value),
            other => Err(FormatError::BadValueType(other)),
        }
    }
}

/// Packs a sequence number and value type into the trailer integer.
#[must_use]
pub fn pack_trailer(sequence: u64, value_type: ValueType) -> u64 {
    (sequence << 8) | u64::from(value_type as u8)
}

/// Appends `user_key ‖ trailer` to `buf`.
pub fn append_internal_key(buf: &mut Vec<u8>, user_key: &[u8], sequence: u64, value_type: ValueType) {
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(&pack_trailer(sequence, value_type).to_le_bytes());
}

/// Builds a fresh internal key.
#[must_use]
pub fn encode_internal_key(user_key: &[u8], sequence: u64, value_type: ValueType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(user_key.len() + TRAILER_SIZE);
    append_internal_key(&mut buf, user_key, sequence, value_type);
    buf
}

/// The probe key for a point lookup: an all-ones trailer sorts before every
/// real entry for the same user key, so a seek lands on the newest record.
#[must_use]
pub fn lookup_key(user_key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(user_key.len() + TRAILER_SIZE);
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(&u64::MAX.to_le_bytes());
    buf
}

/// The user-key portion of an internal key.
pub fn user_key(internal_key: &[u8]) -> Result<&[u8]> {
    if internal_key.len() < TRAILER_SIZE {
        return Err(FormatError::BadInternalKey);
    }
    Ok(&internal_key[..internal_key.len() - TRAILER_SIZE])
}

/// An internal key split into its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: u64,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    /// Splits off the trailer and validates the value-type tag.
    pub fn parse(internal_key: &'a [u8]) -> Result<Self> {
        if internal_key.len() < TRAILER_SIZE {
            return Err(FormatError::BadInternalKey);
        }
        let split = internal_key.len() - TRAILER_SIZE;
        let trailer = u64::from_le_bytes(internal_key[split..].try_into().unwrap());
        Ok(Self {
            user_key: &internal_key[..split],
            sequence: trailer >> 8,
            value_type: ValueType::from_tag((trailer & 0xff) as u8)?,
        })
    }
}

/// Orders internal keys: user key ascending under the wrapped comparator,
/// then trailer descending (newer first).
#[derive(Clone, Copy)]
pub struct InternalKeyComparator {
    user: &'static dyn Comparator,
}

impl InternalKeyComparator {
    #[must_use]
    pub fn new(user: &'static dyn Comparator) -> Self {
        Self { user }
    }

    /// The wrapped user-key comparator.
    #[must_use]
    pub fn user_comparator(&self) -> &'static dyn Comparator {
        self.user
    }

    /// Compares two internal keys.
    ///
    /// Keys shorter than the trailer compare as if their trailer were zero;
    /// block decoding rejects such keys before they reach a comparison, so
    /// this never decides a real lookup.
    #[must_use]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let (user_a, trailer_a) = split_lenient(a);
        let (user_b, trailer_b) = split_lenient(b);
        match self.user.compare(user_a, user_b) {
            Ordering::Equal => trailer_b.cmp(&trailer_a),
            ord => ord,
        }
    }
}

impl std::fmt::Debug for InternalKeyComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalKeyComparator")
            .field("user", &self.user.name())
            .finish()
    }
}

fn split_lenient(key: &[u8]) -> (&[u8], u64) {
    if key.len() < TRAILER_SIZE {
        return (key, 0);
    }
    let split = key.len() - TRAILER_SIZE;
    let trailer = u64::from_le_bytes(key[split..].try_into().unwrap());
    (&key[..split], trailer)
}
