use crate::tests::{ikey_cmp, to_table_entries, Record};
use crate::{Footer, TableWriter, FOOTER_SIZE, TABLE_MAGIC};
use format::internal_key::{encode_internal_key, ValueType};
use tempfile::tempdir;

fn sample_records() -> Vec<Record> {
    vec![
        (b"a".to_vec(), 1, Some(b"apple".to_vec())),
        (b"b".to_vec(), 2, Some(b"banana".to_vec())),
        (b"c".to_vec(), 3, Some(b"".to_vec())),
        (b"d".to_vec(), 4, None), // tombstone
    ]
}

#[test]
fn written_file_ends_with_footer_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000001.ldb");

    let mut w = TableWriter::create(&path, ikey_cmp()).unwrap();
    for (k, v) in to_table_entries(&sample_records()) {
        w.add(&k, &v).unwrap();
    }
    let size = w.finish().unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len() as u64, size);
    assert_eq!(
        u64::from_le_bytes(raw[raw.len() - 8..].try_into().unwrap()),
        TABLE_MAGIC
    );

    // The footer decodes and its handles point inside the file.
    let footer = Footer::decode(&raw[raw.len() - FOOTER_SIZE..]).unwrap();
    assert!(footer.index.offset + footer.index.size <= (raw.len() - FOOTER_SIZE) as u64);
    assert!(footer.metaindex.offset + footer.metaindex.size <= footer.index.offset);
}

#[test]
fn tmp_file_not_left_behind() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000002.ldb");

    let mut w = TableWriter::create(&path, ikey_cmp()).unwrap();
    for (k, v) in to_table_entries(&sample_records()) {
        w.add(&k, &v).unwrap();
    }
    w.finish().unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["000002.ldb".to_string()]);
}

#[test]
fn large_table_splits_into_many_blocks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000003.ldb");

    let mut w = TableWriter::create(&path, ikey_cmp()).unwrap();
    for i in 0..2000u64 {
        let ikey = encode_internal_key(
            format!("key{i:08}").as_bytes(),
            i + 1,
            ValueType::Value,
        );
        w.add(&ikey, &vec![b'v'; 32]).unwrap();
    }
    assert_eq!(w.num_entries(), 2000);
    let size = w.finish().unwrap();

    // ~2000 * (20 key + 32 value + overhead) bytes of data at a 4 KiB block
    // target means well over a dozen data blocks.
    assert!(size > 64 * 1024, "size = {size}");
}

#[test]
#[should_panic(expected = "keys added out of order")]
fn out_of_order_keys_panic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000004.ldb");

    let mut w = TableWriter::create(&path, ikey_cmp()).unwrap();
    w.add(&encode_internal_key(b"b", 1, ValueType::Value), b"1")
        .unwrap();
    w.add(&encode_internal_key(b"a", 1, ValueType::Value), b"2")
        .unwrap();
}

#[test]
#[should_panic(expected = "keys added out of order")]
fn older_sequence_for_same_key_must_come_second() {
    // Within one user key, ascending internal order means descending
    // sequence; adding the older record first is a caller bug.
    let dir = tempdir().unwrap();
    let path = dir.path().join("000005.ldb");

    let mut w = TableWriter::create(&path, ikey_cmp()).unwrap();
    w.add(&encode_internal_key(b"k", 5, ValueType::Value), b"old")
        .unwrap();
    w.add(&encode_internal_key(b"k", 9, ValueType::Value), b"new")
        .unwrap();
}
