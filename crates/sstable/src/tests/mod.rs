mod reader_tests;
mod writer_tests;

use format::comparator::BytewiseComparator;
use format::internal_key::{encode_internal_key, InternalKeyComparator, ValueType};

pub fn ikey_cmp() -> InternalKeyComparator {
    InternalKeyComparator::new(&BytewiseComparator)
}

/// `(user key, sequence, value-or-tombstone)` triple for fixture tables.
pub type Record = (Vec<u8>, u64, Option<Vec<u8>>);

/// Encodes records as internal-key/value pairs in table order.
pub fn to_table_entries(records: &[Record]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let cmp = ikey_cmp();
    let mut out: Vec<(Vec<u8>, Vec<u8>)> = records
        .iter()
        .map(|(user_key, seq, value)| {
            let vt = if value.is_some() {
                ValueType::Value
            } else {
                ValueType::Deletion
            };
            (
                encode_internal_key(user_key, *seq, vt),
                value.clone().unwrap_or_default(),
            )
        })
        .collect();
    out.sort_by(|a, b| cmp.compare(&a.0, &b.0));
    out
}
