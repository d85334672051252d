use crate::block::BlockBuilder;
use crate::tests::{ikey_cmp, to_table_entries, Record};
use crate::{BlockHandle, Footer, TableError, TableReader, TableWriter, FOOTER_SIZE};
use byteorder::{LittleEndian, WriteBytesExt};
use format::crc::masked_crc;
use format::internal_key::{encode_internal_key, ValueType};
use std::path::Path;
use tempfile::tempdir;

fn write_table(path: &Path, records: &[Record]) {
    let mut w = TableWriter::create(path, ikey_cmp()).unwrap();
    for (k, v) in to_table_entries(records) {
        w.add(&k, &v).unwrap();
    }
    w.finish().unwrap();
}

fn sample_records() -> Vec<Record> {
    vec![
        (b"a".to_vec(), 1, Some(b"apple".to_vec())),
        (b"b".to_vec(), 2, Some(b"banana".to_vec())),
        (b"c".to_vec(), 3, Some(b"".to_vec())),
        (b"d".to_vec(), 4, None),
    ]
}

// -------------------- Basic open & get --------------------

#[test]
fn open_and_get_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000010.ldb");
    write_table(&path, &sample_records());

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();

    let a = reader.get(b"a").unwrap().expect("a must exist");
    assert_eq!(a.sequence, 1);
    assert_eq!(a.value, Some(b"apple".to_vec()));

    let b = reader.get(b"b").unwrap().expect("b must exist");
    assert_eq!(b.sequence, 2);
    assert_eq!(b.value, Some(b"banana".to_vec()));

    // Present but empty value.
    let c = reader.get(b"c").unwrap().expect("c must exist");
    assert_eq!(c.sequence, 3);
    assert_eq!(c.value, Some(b"".to_vec()));

    // Tombstone: found, but with no value.
    let d = reader.get(b"d").unwrap().expect("d must exist");
    assert_eq!(d.sequence, 4);
    assert_eq!(d.value, None);

    // Absent keys on both sides of the key range and in a gap.
    assert!(reader.get(b"0").unwrap().is_none());
    assert!(reader.get(b"bb").unwrap().is_none());
    assert!(reader.get(b"zz").unwrap().is_none());
}

#[test]
fn newest_sequence_wins_within_a_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000011.ldb");
    write_table(
        &path,
        &[
            (b"k".to_vec(), 100, Some(b"newest".to_vec())),
            (b"k".to_vec(), 50, Some(b"older".to_vec())),
            (b"k".to_vec(), 1, Some(b"oldest".to_vec())),
        ],
    );

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    let entry = reader.get(b"k").unwrap().unwrap();
    assert_eq!(entry.sequence, 100);
    assert_eq!(entry.value, Some(b"newest".to_vec()));
}

#[test]
fn tombstone_newer_than_value_is_returned() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000012.ldb");
    write_table(
        &path,
        &[
            (b"k".to_vec(), 100, None),
            (b"k".to_vec(), 50, Some(b"stale".to_vec())),
        ],
    );

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    let entry = reader.get(b"k").unwrap().unwrap();
    assert_eq!(entry.sequence, 100);
    assert_eq!(entry.value, None);
}

#[test]
fn lookups_across_many_blocks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000013.ldb");

    let records: Vec<Record> = (0..3000u64)
        .map(|i| {
            (
                format!("key{i:08}").into_bytes(),
                i + 1,
                Some(format!("value{i}").into_bytes()),
            )
        })
        .collect();
    write_table(&path, &records);

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    for i in (0..3000u64).step_by(97) {
        let entry = reader
            .get(format!("key{i:08}").as_bytes())
            .unwrap()
            .unwrap_or_else(|| panic!("key{i:08} missing"));
        assert_eq!(entry.value, Some(format!("value{i}").into_bytes()));
    }
    assert!(reader.get(b"key99999999").unwrap().is_none());
}

#[test]
fn empty_table_finds_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000014.ldb");
    write_table(&path, &[]);

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    assert!(reader.get(b"anything").unwrap().is_none());
}

// -------------------- Validation errors --------------------

#[test]
fn open_file_too_small() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.ldb");
    std::fs::write(&path, b"short").unwrap();

    assert!(matches!(
        TableReader::open(&path, ikey_cmp()),
        Err(TableError::TooSmall)
    ));
}

#[test]
fn open_bad_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("badmagic.ldb");
    write_table(&path, &sample_records());

    let mut raw = std::fs::read(&path).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0xff;
    std::fs::write(&path, &raw).unwrap();

    assert!(matches!(
        TableReader::open(&path, ikey_cmp()),
        Err(TableError::BadMagic)
    ));
}

#[test]
fn open_nonexistent_file() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        TableReader::open(dir.path().join("nope.ldb"), ikey_cmp()),
        Err(TableError::Io(_))
    ));
}

#[test]
fn flipped_bit_in_data_block_fails_get() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000015.ldb");
    write_table(&path, &sample_records());

    // The first data block starts at offset 0; flip a bit in its payload.
    let mut raw = std::fs::read(&path).unwrap();
    raw[2] ^= 0x01;
    std::fs::write(&path, &raw).unwrap();

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    assert!(matches!(
        reader.get(b"a"),
        Err(TableError::BadBlockChecksum)
    ));
}

#[test]
fn corrupt_index_block_fails_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000016.ldb");
    write_table(&path, &sample_records());

    let mut raw = std::fs::read(&path).unwrap();
    let footer = Footer::decode(&raw[raw.len() - FOOTER_SIZE..]).unwrap();
    raw[footer.index.offset as usize] ^= 0x01;
    std::fs::write(&path, &raw).unwrap();

    assert!(matches!(
        TableReader::open(&path, ikey_cmp()),
        Err(TableError::BadBlockChecksum)
    ));
}

// -------------------- Compression --------------------

/// Builds a minimal table whose single data block carries the given
/// compression tag (with a correct checksum), so the reader's reaction to
/// the tag itself can be observed.
fn write_table_with_compression_tag(path: &Path, tag: u8) {
    let mut file = Vec::new();

    // Data block.
    let mut data = BlockBuilder::new(16);
    data.add(&encode_internal_key(b"k", 1, ValueType::Value), b"v");
    let data_contents = data.finish();
    let data_handle = BlockHandle {
        offset: 0,
        size: data_contents.len() as u64,
    };
    file.extend_from_slice(&data_contents);
    file.push(tag);
    file.write_u32::<LittleEndian>(masked_crc(&[data_contents.as_slice(), &[tag]]))
        .unwrap();

    // Empty metaindex block, uncompressed.
    let metaindex_contents = BlockBuilder::new(16).finish();
    let metaindex = BlockHandle {
        offset: file.len() as u64,
        size: metaindex_contents.len() as u64,
    };
    file.extend_from_slice(&metaindex_contents);
    file.push(0);
    file.write_u32::<LittleEndian>(masked_crc(&[metaindex_contents.as_slice(), &[0u8]]))
        .unwrap();

    // Index block pointing at the data block, uncompressed.
    let mut index = BlockBuilder::new(1);
    let mut handle_enc = Vec::new();
    data_handle.encode_to(&mut handle_enc);
    index.add(&encode_internal_key(b"k", 1, ValueType::Value), &handle_enc);
    let index_contents = index.finish();
    let index_handle = BlockHandle {
        offset: file.len() as u64,
        size: index_contents.len() as u64,
    };
    file.extend_from_slice(&index_contents);
    file.push(0);
    file.write_u32::<LittleEndian>(masked_crc(&[index_contents.as_slice(), &[0u8]]))
        .unwrap();

    file.extend_from_slice(
        &Footer {
            metaindex,
            index: index_handle,
        }
        .encode(),
    );
    std::fs::write(path, &file).unwrap();
}

#[test]
fn snappy_block_rejected_as_unsupported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snappy.ldb");
    write_table_with_compression_tag(&path, 1);

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    assert!(matches!(
        reader.get(b"k"),
        Err(TableError::UnsupportedCompression(1))
    ));
}

#[test]
fn zstd_block_rejected_as_unsupported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zstd.ldb");
    write_table_with_compression_tag(&path, 2);

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    assert!(matches!(
        reader.get(b"k"),
        Err(TableError::UnsupportedCompression(2))
    ));
}

#[test]
fn unknown_compression_tag_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("weird.ldb");
    write_table_with_compression_tag(&path, 9);

    let reader = TableReader::open(&path, ikey_cmp()).unwrap();
    assert!(matches!(
        reader.get(b"k"),
        Err(TableError::BadBlockTrailer)
    ));
}
