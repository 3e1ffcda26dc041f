//! # Internal Page Operations
//!
//! Child lookup, separator insertion, internal page splits, new-root
//! creation and the upward propagation of separators after a split.
//!
//! ## Child Lookup
//!
//! `find_child` binary-searches for the first separator strictly greater
//! than the probe key; the child to descend into is the right child of
//! the previous entry, or the header's leftmost child when every
//! separator is greater. A probe equal to a separator descends right,
//! matching the invariant that an entry's child holds keys greater than
//! or equal to its key.
//!
//! ## Internal Split
//!
//! Splitting an internal page differs from a leaf split: the middle key
//! is *promoted* to the parent and kept in neither half. Its right child
//! becomes the leftmost child of the new right page. Every child that
//! moves to the right page, the new leftmost included, has its parent
//! pointer rewritten and persisted before the right page itself is
//! written.
//!
//! ## Propagation
//!
//! `insert_into_parent` walks upward: a separator that fits is inserted
//! in place; a full parent is split and the pending separator is placed
//! into whichever half its key range selects before recursing with the
//! promoted key. When the propagation reaches a page with no parent, a
//! new root is created and the meta page is rewritten last.

use std::cmp::Ordering;

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::config::{MAX_PAGE_ID, PAGE_SIZE};
use crate::record::{
    compact_page, compare_keys, internal_child_at, internal_entry_size, search_record,
    slot_key, write_internal_entry, write_raw_record, InternalEntry, SearchResult,
};
use crate::storage::{validate_page, Page, PageLevel, PageType};
use crate::table::TableHandle;

use super::{SeparatorKey, SplitResult};

/// Returns the child page to descend into for `key`.
pub(crate) fn find_child(page: &Page, key: &[u8]) -> Result<u32> {
    let header = page.header();
    ensure!(
        header.page_level() == PageLevel::Internal,
        "find_child on non-internal page {}",
        header.page_id()
    );

    // First slot whose key is strictly greater than the probe; equal keys
    // advance past, so ties descend right.
    let count = header.cell_count();
    let mut lo: u16 = 0;
    let mut hi: u16 = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_key = slot_key(page, mid)?;
        if compare_keys(key, mid_key) == Ordering::Less {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    let child = if lo == 0 {
        header.leftmost_child()
    } else {
        internal_child_at(page, lo - 1)?
    };

    ensure!(
        child != 0 && child <= MAX_PAGE_ID,
        "internal page {} references invalid child {}",
        header.page_id(),
        child
    );

    Ok(child)
}

/// Inserts `(key, right_child)` into an internal page without splitting.
/// Returns `Ok(false)` when the entry does not fit.
pub(crate) fn insert_no_split(page: &mut Page, key: &[u8], right_child: u32) -> Result<bool> {
    ensure!(
        page.header().page_level() == PageLevel::Internal,
        "internal insert on non-internal page {}",
        page.header().page_id()
    );

    if !page.can_insert(internal_entry_size(key.len())) {
        return Ok(false);
    }

    let position = match search_record(page, key)? {
        SearchResult::Found(_) => bail!(
            "separator key already present in internal page {}",
            page.header().page_id()
        ),
        SearchResult::NotFound(i) => i,
    };

    let offset = write_internal_entry(page, key, right_child)?;
    page.insert_slot(position, offset)?;
    Ok(true)
}

/// Splits a full internal page. The middle key is promoted: it is removed
/// from the left page and returned as the separator instead of being
/// copied into either half.
pub(crate) fn split_page(table: &mut TableHandle, left: &mut Page) -> Result<SplitResult> {
    let total = left.header().cell_count();
    ensure!(
        left.header().page_level() == PageLevel::Internal,
        "cannot internal-split non-internal page {}",
        left.header().page_id()
    );
    ensure!(
        total >= 2,
        "cannot split internal page {} with {} entries",
        left.header().page_id(),
        total
    );

    let new_page_id = table.allocate_page()?;
    let mut right = Page::init(new_page_id, PageType::Index, PageLevel::Internal);
    right
        .header_mut()
        .set_parent_page(left.header().parent_page());

    let mid = total / 2;

    // Copy the promoted key out before slots start moving.
    let separator: SeparatorKey = SmallVec::from_slice(slot_key(left, mid)?);

    // The promoted key's right child becomes the leftmost child of the
    // right page.
    let new_leftmost = internal_child_at(left, mid)?;
    right.header_mut().set_leftmost_child(new_leftmost);

    for i in (mid + 1)..total {
        let offset = left.slot(i)? as usize;
        let entry = InternalEntry::from_bytes(&left.as_bytes()[offset..])?;
        let size = internal_entry_size(entry.key_size() as usize);
        let child = entry.child_page();
        ensure!(
            offset + size <= PAGE_SIZE,
            "internal entry at slot {} extends beyond page boundary",
            i
        );

        let new_offset = {
            let raw = &left.as_bytes()[offset..offset + size];
            write_raw_record(&mut right, raw)?
        };
        let position = right.header().cell_count();
        right.insert_slot(position, new_offset)?;

        reparent(table, child, new_page_id)?;
    }
    reparent(table, new_leftmost, new_page_id)?;

    // Drop the promoted key and everything after it from the left page;
    // the entry bytes stay behind as dead space.
    while left.header().cell_count() > mid {
        let last = left.header().cell_count() - 1;
        left.remove_slot(last)?;
    }

    validate_page(right.as_bytes())?;
    table.write_page(new_page_id, &right)?;

    tracing::debug!(
        left = left.header().page_id(),
        right = new_page_id,
        moved = total - mid - 1,
        "split internal page"
    );

    Ok(SplitResult {
        new_page: new_page_id,
        separator,
    })
}

/// Allocates a new internal root over `left` and `right` and points the
/// meta page at it. The meta page is rewritten only after the root and
/// both children's parent pointers are on disk.
pub(crate) fn create_new_root(
    table: &mut TableHandle,
    left: u32,
    separator: &[u8],
    right: u32,
) -> Result<()> {
    let new_root_id = table.allocate_page()?;
    let mut root = Page::init(new_root_id, PageType::Index, PageLevel::Internal);
    root.header_mut().set_leftmost_child(left);

    let offset = write_internal_entry(&mut root, separator, right)?;
    root.insert_slot(0, offset)?;

    table.write_page(new_root_id, &root)?;

    reparent(table, left, new_root_id)?;
    reparent(table, right, new_root_id)?;

    table.set_root(new_root_id)?;

    tracing::debug!(root = new_root_id, left, right, "created new root");
    Ok(())
}

/// Inserts the separator produced by splitting `left` into its parent,
/// splitting internal pages upward as needed.
pub(crate) fn insert_into_parent(
    table: &mut TableHandle,
    left: u32,
    separator: &[u8],
    right: u32,
) -> Result<()> {
    let left_page = table.read_page(left)?;
    let parent_id = left_page.header().parent_page();

    if parent_id == 0 {
        return create_new_root(table, left, separator, right);
    }
    if parent_id > MAX_PAGE_ID {
        // Conservative recovery: a broken parent pointer promotes a new
        // root instead of losing the split.
        return create_new_root(table, left, separator, right);
    }

    let mut parent = table.read_page(parent_id)?;
    if parent.header().page_level() != PageLevel::Internal {
        return create_new_root(table, left, separator, right);
    }

    match search_record(&parent, separator)? {
        SearchResult::Found(_) => bail!(
            "separator key already present in parent page {}",
            parent_id
        ),
        SearchResult::NotFound(0) => {
            // The separator becomes the first key: `left` must be the
            // subtree below it, i.e. the parent's leftmost child.
            parent.header_mut().set_leftmost_child(left);
        }
        SearchResult::NotFound(_) => {}
    }

    if insert_no_split(&mut parent, separator, right)? {
        validate_page(parent.as_bytes())?;
        table.write_page(parent_id, &parent)?;
        return Ok(());
    }

    let split = split_page(table, &mut parent)?;

    // Place the pending separator into the half its key range selects,
    // then continue upward with the promoted key.
    if compare_keys(separator, &split.separator) == Ordering::Less {
        if !insert_no_split(&mut parent, separator, right)? {
            // The left half still carries the dead bytes of the moved
            // entries; rewriting it frees at least half the page.
            compact_page(&mut parent)?;
            ensure!(
                insert_no_split(&mut parent, separator, right)?,
                "split parent page {} cannot take the pending separator",
                parent_id
            );
        }
        validate_page(parent.as_bytes())?;
        table.write_page(parent_id, &parent)?;
    } else {
        validate_page(parent.as_bytes())?;
        table.write_page(parent_id, &parent)?;

        let mut new_half = table.read_page(split.new_page)?;
        if let SearchResult::NotFound(0) = search_record(&new_half, separator)? {
            new_half.header_mut().set_leftmost_child(left);
        }
        // The right child now hangs off the new half.
        reparent(table, right, split.new_page)?;
        ensure!(
            insert_no_split(&mut new_half, separator, right)?,
            "new internal page {} cannot take the pending separator",
            split.new_page
        );
        validate_page(new_half.as_bytes())?;
        table.write_page(split.new_page, &new_half)?;
    }

    insert_into_parent(table, parent_id, &split.separator, split.new_page)
}

/// Rewrites a child page's parent pointer and persists it.
fn reparent(table: &mut TableHandle, child_id: u32, parent_id: u32) -> Result<()> {
    let mut child = table.read_page(child_id)?;
    child.header_mut().set_parent_page(parent_id);
    table.write_page(child_id, &child)
}
