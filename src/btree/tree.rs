//! # B+ Tree Entry Points
//!
//! The public `search` and `insert` operations, orchestrating descent,
//! leaf insertion, splits and upward separator propagation.
//!
//! ## Search
//!
//! Search descends to the responsible leaf and binary-searches it. The
//! value is copied out of the page buffer, so the result stays valid
//! across later engine calls.
//!
//! ## Insert
//!
//! The first insert into an empty table creates the root leaf. Duplicate
//! keys are rejected with `Ok(false)`; that is an expected outcome, not
//! an error. When a leaf fills up it is split and the new record goes to
//! whichever half the separator comparison selects: strictly smaller
//! keys to the left, everything else to the right.
//!
//! ## Full Halves After a Split
//!
//! A split frees only slot bytes on the left page; the moved records'
//! bytes stay behind dead. When the new record belongs on the left and
//! does not fit, the left page is compacted (its live records rewritten
//! contiguously) first. If even that is not enough, the split is linked
//! into the parent and the insert descends again into the grown tree; a
//! few rounds always suffice since each one halves the target leaf's
//! payload.
//!
//! ## Oversized Records
//!
//! A record can legitimately occupy a leaf almost entirely by itself.
//! Splitting such a single-record leaf yields an empty right page, and
//! when the incoming key sorts below the resident record the left page
//! still has no room. In that case the resident record is moved to the
//! right page, the left page (now empty) is reinitialized and takes the
//! new record, and the separator sent to the parent is the moved
//! record's key. A record too large to fit even an empty page is
//! rejected up front instead of splitting forever.

use std::cmp::Ordering;

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::{MAX_KEY_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, PAGE_USABLE_SIZE, SLOT_SIZE};
use crate::record::{
    compact_page, compare_keys, page_insert, record_size, search_record, slot_key,
    slot_value, write_raw_record, RecordHeader, SearchResult,
};
use crate::storage::{Page, PageLevel, PageType};
use crate::table::TableHandle;

use super::{internal, leaf, SeparatorKey};

/// How many split-and-retry rounds one insert may take. Every round
/// splits the target leaf, so its live payload shrinks geometrically and
/// real workloads finish in one or two.
const MAX_SPLIT_RETRIES: usize = 16;

/// Looks up `key`, returning an owned copy of its value.
pub fn search(table: &mut TableHandle, key: &[u8]) -> Result<Option<Vec<u8>>> {
    if table.root_page() == 0 {
        return Ok(None);
    }

    let (_leaf_id, leaf_page) = leaf::find_leaf_page(table, key)?;

    match search_record(&leaf_page, key)? {
        SearchResult::Found(index) => Ok(Some(slot_value(&leaf_page, index)?.to_vec())),
        SearchResult::NotFound(_) => Ok(None),
    }
}

/// Inserts `(key, value)`. Returns `Ok(false)` when the key is already
/// present; the tree is left untouched in that case.
pub fn insert(table: &mut TableHandle, key: &[u8], value: &[u8]) -> Result<bool> {
    ensure!(
        key.len() <= MAX_KEY_SIZE,
        "key length {} exceeds maximum {}",
        key.len(),
        MAX_KEY_SIZE
    );

    let size = record_size(key.len(), value.len());
    ensure!(
        size + SLOT_SIZE <= PAGE_USABLE_SIZE,
        "record of {} bytes can never fit a page ({} usable)",
        size,
        PAGE_USABLE_SIZE
    );

    // First insert into an empty tree: the root is born as a leaf.
    if table.root_page() == 0 {
        let root_id = table.allocate_page()?;
        let mut root = Page::init(root_id, PageType::Data, PageLevel::Leaf);
        page_insert(&mut root, key, value)?;
        table.write_page(root_id, &root)?;
        table.set_root(root_id)?;
        tracing::debug!(root = root_id, "created root leaf");
        return Ok(true);
    }

    for _attempt in 0..MAX_SPLIT_RETRIES {
        let (leaf_id, mut leaf_page) = leaf::find_leaf_page(table, key)?;

        if let SearchResult::Found(_) = search_record(&leaf_page, key)? {
            return Ok(false);
        }

        if leaf::insert_no_split(table, leaf_id, &mut leaf_page, key, value)? {
            return Ok(true);
        }

        // The leaf is full: split it, then place the new record.
        let split = leaf::split_page(table, &mut leaf_page)?;
        table.write_page(leaf_id, &leaf_page)?;

        let mut separator = split.separator;

        if compare_keys(key, &separator) == Ordering::Less {
            if !leaf_page.can_insert(size) {
                // The split only freed slots; rewriting the page
                // reclaims the moved records' dead bytes too.
                compact_page(&mut leaf_page)?;
            }
            if leaf_page.can_insert(size) {
                page_insert(&mut leaf_page, key, value)?;
                table.write_page(leaf_id, &leaf_page)?;
                internal::insert_into_parent(table, leaf_id, &separator, split.new_page)?;
                return Ok(true);
            }

            let mut right = table.read_page(split.new_page)?;
            if right.header().cell_count() == 0 && leaf_page.header().cell_count() == 1 {
                let resident = move_resident_record(
                    table,
                    leaf_id,
                    &mut leaf_page,
                    split.new_page,
                    &mut right,
                    key,
                    value,
                )?;
                internal::insert_into_parent(table, leaf_id, &resident, split.new_page)?;
                return Ok(true);
            }

            // Even the compacted half cannot hold the record. Link the
            // split into the parent, then descend again into the grown
            // tree; each round leaves the target leaf with less payload.
            table.write_page(leaf_id, &leaf_page)?;
            internal::insert_into_parent(table, leaf_id, &separator, split.new_page)?;
        } else {
            let mut right = table.read_page(split.new_page)?;
            if right.can_insert(size) {
                page_insert(&mut right, key, value)?;
                // The separator must be the right page's smallest key.
                // When the split produced an empty right page
                // (single-record leaf), that is the record just
                // inserted, not the naive split separator.
                separator = SmallVec::from_slice(slot_key(&right, 0)?);
                table.write_page(split.new_page, &right)?;
                internal::insert_into_parent(table, leaf_id, &separator, split.new_page)?;
                return Ok(true);
            }

            internal::insert_into_parent(table, leaf_id, &separator, split.new_page)?;
        }

        tracing::debug!(leaf = leaf_id, "record did not fit either half, descending again");
    }

    bail!(
        "record of {} bytes still unplaced after {} splits",
        size,
        MAX_SPLIT_RETRIES
    );
}

/// The oversized-record path: the left leaf holds exactly one record that
/// the naive split could not move, and the incoming key sorts below it.
/// Moves the resident record to the (empty) right page, reinitializes the
/// left record area and inserts the new record there. Returns the moved
/// record's key as the separator for the parent.
fn move_resident_record(
    table: &mut TableHandle,
    left_id: u32,
    left: &mut Page,
    right_id: u32,
    right: &mut Page,
    key: &[u8],
    value: &[u8],
) -> Result<SeparatorKey> {
    ensure!(
        right.header().cell_count() == 0 && left.header().cell_count() == 1,
        "leaf {} cannot take a record after split",
        left_id
    );

    let offset = left.slot(0)? as usize;
    let header = RecordHeader::from_bytes(&left.as_bytes()[offset..])?;
    let size = record_size(header.key_size() as usize, header.value_size() as usize);
    ensure!(
        offset + size <= PAGE_SIZE,
        "resident record extends beyond page boundary"
    );

    let resident_key: SeparatorKey = SmallVec::from_slice(slot_key(left, 0)?);

    let new_offset = {
        let raw = &left.as_bytes()[offset..offset + size];
        write_raw_record(right, raw)?
    };
    right.insert_slot(0, new_offset)?;

    // The left page is empty now; reclaim its record area so the new
    // record fits. This is the one place a page is rewritten in place.
    left.remove_slot(0)?;
    left.header_mut().set_free_start(PAGE_HEADER_SIZE as u16);
    page_insert(left, key, value)?;

    // Right before left: until the left page is rewritten, the resident
    // record exists on at least one reachable page.
    table.write_page(right_id, right)?;
    table.write_page(left_id, left)?;

    tracing::debug!(left = left_id, right = right_id, "moved resident record");

    Ok(resident_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_table() -> (tempfile::TempDir, TableHandle) {
        let dir = tempdir().unwrap();
        let table = TableHandle::create(dir.path(), "t").unwrap();
        (dir, table)
    }

    #[test]
    fn search_empty_tree_returns_none() {
        let (_dir, mut table) = test_table();

        assert_eq!(search(&mut table, b"x").unwrap(), None);
    }

    #[test]
    fn insert_and_search_single_key() {
        let (_dir, mut table) = test_table();

        assert!(insert(&mut table, b"hello", b"world").unwrap());
        assert_eq!(
            search(&mut table, b"hello").unwrap(),
            Some(b"world".to_vec())
        );
        assert_eq!(search(&mut table, b"other").unwrap(), None);
    }

    #[test]
    fn first_insert_creates_root_leaf() {
        let (_dir, mut table) = test_table();

        insert(&mut table, b"a", b"val1").unwrap();

        assert_eq!(table.root_page(), 1);
        let meta = table.read_page(0).unwrap();
        assert_eq!(meta.header().root_page(), 1);
        assert_eq!(meta.header().next_free_page(), 2);

        let root = table.read_page(1).unwrap();
        assert_eq!(root.header().page_type(), PageType::Data);
        assert_eq!(root.header().page_level(), PageLevel::Leaf);
    }

    #[test]
    fn reverse_order_inserts_stay_sorted() {
        let (_dir, mut table) = test_table();

        insert(&mut table, b"c", b"val_c").unwrap();
        insert(&mut table, b"b", b"val_b").unwrap();
        insert(&mut table, b"a", b"val_a").unwrap();

        assert_eq!(search(&mut table, b"a").unwrap(), Some(b"val_a".to_vec()));
        assert_eq!(search(&mut table, b"b").unwrap(), Some(b"val_b".to_vec()));
        assert_eq!(search(&mut table, b"c").unwrap(), Some(b"val_c".to_vec()));

        let root = table.read_page(table.root_page()).unwrap();
        assert_eq!(slot_key(&root, 0).unwrap(), b"a");
        assert_eq!(slot_key(&root, 1).unwrap(), b"b");
        assert_eq!(slot_key(&root, 2).unwrap(), b"c");
    }

    #[test]
    fn duplicate_insert_returns_false_and_keeps_value() {
        let (_dir, mut table) = test_table();

        assert!(insert(&mut table, b"a", b"v1").unwrap());
        assert!(!insert(&mut table, b"a", b"v2").unwrap());

        assert_eq!(search(&mut table, b"a").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn rejects_key_over_maximum_length() {
        let (_dir, mut table) = test_table();
        let key = vec![b'k'; MAX_KEY_SIZE + 1];

        let result = insert(&mut table, &key, b"v");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn rejects_record_larger_than_a_page() {
        let (_dir, mut table) = test_table();
        let value = vec![0u8; PAGE_SIZE];

        let result = insert(&mut table, b"key", &value);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("can never fit"));
    }

    #[test]
    fn many_inserts_split_and_round_trip() {
        let (_dir, mut table) = test_table();
        let value = vec![0xAB; 500];

        for i in 0..100 {
            let key = format!("key{:05}", i);
            assert!(insert(&mut table, key.as_bytes(), &value).unwrap());
        }

        for i in 0..100 {
            let key = format!("key{:05}", i);
            assert_eq!(
                search(&mut table, key.as_bytes()).unwrap(),
                Some(value.clone()),
                "key {} lost",
                key
            );
        }

        // The tree must have grown past a single leaf.
        let root = table.read_page(table.root_page()).unwrap();
        assert_eq!(root.header().page_level(), PageLevel::Internal);
    }

    #[test]
    fn reverse_order_inserts_split_and_round_trip() {
        let (_dir, mut table) = test_table();
        let value = vec![0x5A; 400];

        for i in (0..120).rev() {
            let key = format!("key{:05}", i);
            assert!(insert(&mut table, key.as_bytes(), &value).unwrap());
        }

        for i in 0..120 {
            let key = format!("key{:05}", i);
            assert_eq!(
                search(&mut table, key.as_bytes()).unwrap(),
                Some(value.clone())
            );
        }
    }

    #[test]
    fn interleaved_inserts_split_and_round_trip() {
        let (_dir, mut table) = test_table();
        let count = 151usize;

        // Visit 0..count in a fixed pseudo-random order.
        for i in 0..count {
            let k = (i * 97) % count;
            let key = format!("key{:05}", k);
            let value = format!("value{:05}", k);
            assert!(insert(&mut table, key.as_bytes(), value.as_bytes()).unwrap());
        }

        for k in 0..count {
            let key = format!("key{:05}", k);
            let value = format!("value{:05}", k);
            assert_eq!(
                search(&mut table, key.as_bytes()).unwrap(),
                Some(value.into_bytes())
            );
        }
    }

    #[test]
    fn oversized_record_then_smaller_below_it() {
        let (_dir, mut table) = test_table();
        let big_value = vec![0xEE; PAGE_USABLE_SIZE - 200];

        assert!(insert(&mut table, b"zz_big", &big_value).unwrap());
        // Sorts below the resident record and cannot share its page.
        assert!(insert(&mut table, b"aa_small", &vec![0x11; 500]).unwrap());

        assert_eq!(
            search(&mut table, b"zz_big").unwrap(),
            Some(big_value.clone())
        );
        assert_eq!(
            search(&mut table, b"aa_small").unwrap(),
            Some(vec![0x11; 500])
        );

        // The resident record moved right; the separator is its key.
        let root = table.read_page(table.root_page()).unwrap();
        assert_eq!(root.header().page_level(), PageLevel::Internal);
        assert_eq!(slot_key(&root, 0).unwrap(), b"zz_big");
    }

    #[test]
    fn oversized_record_then_larger_goes_right() {
        let (_dir, mut table) = test_table();
        let big_value = vec![0xEE; PAGE_USABLE_SIZE - 200];

        assert!(insert(&mut table, b"aa_big", &big_value).unwrap());
        assert!(insert(&mut table, b"zz_small", &vec![0x22; 500]).unwrap());

        assert_eq!(search(&mut table, b"aa_big").unwrap(), Some(big_value));
        assert_eq!(
            search(&mut table, b"zz_small").unwrap(),
            Some(vec![0x22; 500])
        );
    }

    #[test]
    fn descending_large_records_compact_the_left_page() {
        let (_dir, mut table) = test_table();

        // Each record takes roughly a quarter of a page, so after a
        // split the left page cannot take another without reclaiming
        // the dead bytes the split left behind.
        for i in (0..30).rev() {
            let key = format!("key{:04}", i);
            let value = vec![(i % 251) as u8; 1800];
            assert!(insert(&mut table, key.as_bytes(), &value).unwrap());
        }

        for i in 0..30 {
            let key = format!("key{:04}", i);
            assert_eq!(
                search(&mut table, key.as_bytes()).unwrap(),
                Some(vec![(i % 251) as u8; 1800])
            );
        }
    }

    #[test]
    fn record_that_fits_neither_half_retries_after_split() {
        let (_dir, mut table) = test_table();

        // A small record plus two near-half-page records fill a leaf so
        // that neither split half can take a third large record; the
        // insert has to split again on the way down.
        insert(&mut table, b"a", &[1u8; 10]).unwrap();
        insert(&mut table, b"b", &[2u8; 3800]).unwrap();
        insert(&mut table, b"c", &[3u8; 3800]).unwrap();
        assert!(insert(&mut table, b"d", &[4u8; 3800]).unwrap());

        assert_eq!(search(&mut table, b"a").unwrap(), Some(vec![1u8; 10]));
        assert_eq!(search(&mut table, b"b").unwrap(), Some(vec![2u8; 3800]));
        assert_eq!(search(&mut table, b"c").unwrap(), Some(vec![3u8; 3800]));
        assert_eq!(search(&mut table, b"d").unwrap(), Some(vec![4u8; 3800]));
    }

    #[test]
    fn values_survive_splits_byte_for_byte() {
        let (_dir, mut table) = test_table();

        let mut values = Vec::new();
        for i in 0..40 {
            let key = format!("key{:03}", i);
            let value: Vec<u8> = (0..600).map(|j| ((i * 31 + j) % 251) as u8).collect();
            insert(&mut table, key.as_bytes(), &value).unwrap();
            values.push(value);
        }

        for (i, expected) in values.iter().enumerate() {
            let key = format!("key{:03}", i);
            assert_eq!(
                search(&mut table, key.as_bytes()).unwrap().as_deref(),
                Some(expected.as_slice())
            );
        }
    }
}
