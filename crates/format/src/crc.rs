//! Castagnoli CRC32C with the on-disk mask.
//!
//! Checksums are stored *masked*: the raw CRC is rotated and offset so that
//! a stream which happens to contain an embedded CRC of its own prefix does
//! not collide with the stored value. Verification recomputes the CRC over
//! the covered bytes and applies the same mask before comparing.

use crc::{Crc, CRC_32_ISCSI};

/// The Castagnoli polynomial, reflected — the only CRC this format uses.
pub const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const MASK_DELTA: u32 = 0xa282_ead8;

/// Masks a raw CRC for storage: rotate right by 15, add the delta (wrapping).
#[must_use]
pub fn mask(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask`].
#[must_use]
pub fn unmask(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

/// Computes the masked CRC over the concatenation of `parts` without
/// materializing it.
#[must_use]
pub fn masked_crc(parts: &[&[u8]]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    for part in parts {
        digest.update(part);
    }
    mask(digest.finalize())
}
