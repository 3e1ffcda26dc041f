//! # Record Codec and Slotted Search
//!
//! This module encodes and decodes the two cell kinds stored on wrendb
//! pages, compares keys, and binary-searches the slot directory.
//!
//! ## Cell Encodings
//!
//! Leaf pages store records:
//!
//! ```text
//! +-------------------+----------------+------------------+
//! | RecordHeader (5B) | key (key_size) | value (val_size) |
//! +-------------------+----------------+------------------+
//! ```
//!
//! Internal pages store separator entries:
//!
//! ```text
//! +--------------------+----------------+
//! | InternalEntry (6B) | key (key_size) |
//! +--------------------+----------------+
//! ```
//!
//! An entry's `child_page` is the **right** child of its key: the subtree
//! holding keys greater than or equal to it. The child for keys below the
//! first separator lives in the page header (`leftmost_child`).
//!
//! ## Key Comparison
//!
//! Keys are opaque byte strings compared lexicographically as unsigned
//! bytes; on a shared prefix the shorter key is smaller. This is exactly
//! slice ordering in Rust, wrapped in [`compare_keys`] so call sites read
//! as key comparisons.
//!
//! ## Slot Search
//!
//! [`search_record`] binary-searches the slot directory (binary search is
//! used uniformly; there is no linear fallback). It returns `Found(i)` for
//! an exact match or `NotFound(i)` where `i` is the first position whose
//! key is greater than or equal to the probe, i.e. the insertion point.
//!
//! ## Borrowed Views
//!
//! [`slot_key`] and [`slot_value`] return slices into the page buffer.
//! They are valid until the page is next mutated; callers keeping bytes
//! across engine calls must copy them out.

use std::cmp::Ordering;
use std::mem::size_of;

use eyre::{bail, ensure, Result};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{MAX_KEY_SIZE, PAGE_SIZE};
use crate::storage::{Page, PageLevel};

/// Size of the header preceding every leaf record.
pub const RECORD_HEADER_SIZE: usize = 5;

/// Size of the fixed part of every internal entry.
pub const INTERNAL_ENTRY_SIZE: usize = 6;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RecordHeader {
    key_size: U16,
    value_size: U16,
    flags: u8,
}

const _: () = assert!(size_of::<RecordHeader>() == RECORD_HEADER_SIZE);

impl RecordHeader {
    pub fn new(key_size: u16, value_size: u16) -> Self {
        Self {
            key_size: U16::new(key_size),
            value_size: U16::new(value_size),
            flags: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= RECORD_HEADER_SIZE,
            "buffer too small for RecordHeader: {} < {}",
            data.len(),
            RECORD_HEADER_SIZE
        );
        Self::ref_from_bytes(&data[..RECORD_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read RecordHeader: {:?}", e))
    }

    zerocopy_accessors! {
        key_size: u16,
        value_size: u16,
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct InternalEntry {
    key_size: U16,
    child_page: U32,
}

const _: () = assert!(size_of::<InternalEntry>() == INTERNAL_ENTRY_SIZE);

impl InternalEntry {
    pub fn new(key_size: u16, child_page: u32) -> Self {
        Self {
            key_size: U16::new(key_size),
            child_page: U32::new(child_page),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= INTERNAL_ENTRY_SIZE,
            "buffer too small for InternalEntry: {} < {}",
            data.len(),
            INTERNAL_ENTRY_SIZE
        );
        Self::ref_from_bytes(&data[..INTERNAL_ENTRY_SIZE])
            .map_err(|e| eyre::eyre!("failed to read InternalEntry: {:?}", e))
    }

    zerocopy_accessors! {
        key_size: u16,
        child_page: u32,
    }
}

/// Total on-page size of a leaf record.
pub fn record_size(key_len: usize, value_len: usize) -> usize {
    RECORD_HEADER_SIZE + key_len + value_len
}

/// Total on-page size of an internal entry.
pub fn internal_entry_size(key_len: usize) -> usize {
    INTERNAL_ENTRY_SIZE + key_len
}

/// Unsigned lexicographic key comparison; on a shared prefix the shorter
/// key is smaller.
#[inline]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(u16),
    NotFound(u16),
}

impl SearchResult {
    /// The matched position, or the insertion point when not found.
    pub fn index(&self) -> u16 {
        match self {
            SearchResult::Found(i) | SearchResult::NotFound(i) => *i,
        }
    }
}

/// Returns the key addressed by slot `index`, valid until the page is next
/// mutated. Works on both leaf and internal pages.
pub fn slot_key(page: &Page, index: u16) -> Result<&[u8]> {
    let offset = page.slot(index)? as usize;
    let data = page.as_bytes();

    let (key_start, key_len) = match page.header().page_level() {
        PageLevel::Leaf => {
            let header = RecordHeader::from_bytes(&data[offset..])?;
            (offset + RECORD_HEADER_SIZE, header.key_size() as usize)
        }
        PageLevel::Internal => {
            let entry = InternalEntry::from_bytes(&data[offset..])?;
            (offset + INTERNAL_ENTRY_SIZE, entry.key_size() as usize)
        }
    };

    ensure!(
        key_start + key_len <= PAGE_SIZE,
        "key at slot {} extends beyond page boundary: start={}, len={}",
        index,
        key_start,
        key_len
    );

    Ok(&data[key_start..key_start + key_len])
}

/// Returns the value addressed by slot `index` of a leaf page, valid until
/// the page is next mutated.
pub fn slot_value(page: &Page, index: u16) -> Result<&[u8]> {
    ensure!(
        page.header().page_level() == PageLevel::Leaf,
        "slot_value on non-leaf page {}",
        page.header().page_id()
    );

    let offset = page.slot(index)? as usize;
    let data = page.as_bytes();
    let header = RecordHeader::from_bytes(&data[offset..])?;

    let value_start = offset + RECORD_HEADER_SIZE + header.key_size() as usize;
    let value_len = header.value_size() as usize;

    ensure!(
        value_start + value_len <= PAGE_SIZE,
        "value at slot {} extends beyond page boundary: start={}, len={}",
        index,
        value_start,
        value_len
    );

    Ok(&data[value_start..value_start + value_len])
}

/// Returns the right-child page id stored in the internal entry at slot
/// `index`.
pub fn internal_child_at(page: &Page, index: u16) -> Result<u32> {
    ensure!(
        page.header().page_level() == PageLevel::Internal,
        "internal_child_at on non-internal page {}",
        page.header().page_id()
    );

    let offset = page.slot(index)? as usize;
    let entry = InternalEntry::from_bytes(&page.as_bytes()[offset..])?;
    Ok(entry.child_page())
}

/// Binary search over the slot directory. `NotFound(i)` gives the first
/// position whose key is >= the probe, i.e. the insertion point.
pub fn search_record(page: &Page, key: &[u8]) -> Result<SearchResult> {
    let count = page.header().cell_count();
    let mut lo: u16 = 0;
    let mut hi: u16 = count;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_key = slot_key(page, mid)?;
        match compare_keys(mid_key, key) {
            Ordering::Less => lo = mid + 1,
            Ordering::Equal => return Ok(SearchResult::Found(mid)),
            Ordering::Greater => hi = mid,
        }
    }

    Ok(SearchResult::NotFound(lo))
}

/// Appends pre-encoded cell bytes at `free_start` and returns their
/// offset. The caller is responsible for adding a slot.
pub fn write_raw_record(page: &mut Page, raw: &[u8]) -> Result<u16> {
    let header = page.header();
    let offset = header.free_start() as usize;
    ensure!(
        offset + raw.len() <= header.free_end() as usize,
        "cell of {} bytes does not fit page {} (free_start={}, free_end={})",
        raw.len(),
        header.page_id(),
        header.free_start(),
        header.free_end()
    );

    page.as_bytes_mut()[offset..offset + raw.len()].copy_from_slice(raw);
    page.header_mut().set_free_start((offset + raw.len()) as u16);
    Ok(offset as u16)
}

/// Inserts a `(key, value)` record into a leaf page, keeping slots in key
/// order. The caller has already verified the key is absent and the record
/// fits.
pub fn page_insert(page: &mut Page, key: &[u8], value: &[u8]) -> Result<()> {
    ensure!(
        page.header().page_level() == PageLevel::Leaf,
        "page_insert on non-leaf page {}",
        page.header().page_id()
    );
    ensure!(
        key.len() <= MAX_KEY_SIZE,
        "key length {} exceeds maximum {}",
        key.len(),
        MAX_KEY_SIZE
    );

    let size = record_size(key.len(), value.len());
    ensure!(
        page.can_insert(size),
        "record of {} bytes does not fit page {} (free space {})",
        size,
        page.header().page_id(),
        page.header().free_space()
    );

    let position = match search_record(page, key)? {
        SearchResult::Found(_) => bail!(
            "key already present in page {}",
            page.header().page_id()
        ),
        SearchResult::NotFound(i) => i,
    };

    let offset = page.header().free_start() as usize;
    let header = RecordHeader::new(key.len() as u16, value.len() as u16);

    let data = page.as_bytes_mut();
    data[offset..offset + RECORD_HEADER_SIZE].copy_from_slice(header.as_bytes());
    data[offset + RECORD_HEADER_SIZE..offset + RECORD_HEADER_SIZE + key.len()]
        .copy_from_slice(key);
    data[offset + RECORD_HEADER_SIZE + key.len()..offset + size].copy_from_slice(value);

    page.header_mut().set_free_start((offset + size) as u16);
    page.insert_slot(position, offset as u16)?;
    Ok(())
}

/// Total on-page size of the cell starting at `offset`, according to the
/// page's level.
fn cell_size_at(page: &Page, offset: usize) -> Result<usize> {
    let data = page.as_bytes();
    match page.header().page_level() {
        PageLevel::Leaf => {
            let header = RecordHeader::from_bytes(&data[offset..])?;
            Ok(record_size(
                header.key_size() as usize,
                header.value_size() as usize,
            ))
        }
        PageLevel::Internal => {
            let entry = InternalEntry::from_bytes(&data[offset..])?;
            Ok(internal_entry_size(entry.key_size() as usize))
        }
    }
}

/// Rewrites the live cells of a page contiguously from the start of the
/// record area, reclaiming the dead bytes earlier splits left behind.
/// Slot order and count are unchanged; only the stored offsets move.
pub fn compact_page(page: &mut Page) -> Result<()> {
    let count = page.header().cell_count();

    let mut cells: Vec<Vec<u8>> = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = page.slot(i)? as usize;
        let size = cell_size_at(page, offset)?;
        ensure!(
            offset + size <= PAGE_SIZE,
            "cell at slot {} extends beyond page boundary",
            i
        );
        cells.push(page.as_bytes()[offset..offset + size].to_vec());
    }

    page.header_mut()
        .set_free_start(crate::config::PAGE_HEADER_SIZE as u16);
    for (i, cell) in cells.iter().enumerate() {
        let offset = write_raw_record(page, cell)?;
        page.set_slot(i as u16, offset)?;
    }

    Ok(())
}

/// Appends an internal entry (separator key + right child) at `free_start`
/// and returns its offset. The caller is responsible for adding a slot.
pub fn write_internal_entry(page: &mut Page, key: &[u8], child_page: u32) -> Result<u16> {
    ensure!(
        page.header().page_level() == PageLevel::Internal,
        "write_internal_entry on non-internal page {}",
        page.header().page_id()
    );
    ensure!(
        key.len() <= MAX_KEY_SIZE,
        "key length {} exceeds maximum {}",
        key.len(),
        MAX_KEY_SIZE
    );

    let size = internal_entry_size(key.len());
    let offset = page.header().free_start() as usize;
    ensure!(
        offset + size <= page.header().free_end() as usize,
        "internal entry of {} bytes does not fit page {}",
        size,
        page.header().page_id()
    );

    let entry = InternalEntry::new(key.len() as u16, child_page);
    let data = page.as_bytes_mut();
    data[offset..offset + INTERNAL_ENTRY_SIZE].copy_from_slice(entry.as_bytes());
    data[offset + INTERNAL_ENTRY_SIZE..offset + size].copy_from_slice(key);

    page.header_mut().set_free_start((offset + size) as u16);
    Ok(offset as u16)
}
