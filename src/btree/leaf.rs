//! # Leaf Page Operations
//!
//! Root-to-leaf descent, in-place leaf insertion and leaf splitting.
//!
//! ## Descent
//!
//! `find_leaf_page` starts at the handle's cached root and follows child
//! pointers until it reaches a page at leaf level, returning the page id
//! together with the loaded buffer so the caller gets its target leaf in
//! one read. Descent treats a zero or implausibly large page id, or a
//! path longer than `MAX_TREE_DEPTH`, as tree corruption.
//!
//! ## Leaf Split
//!
//! A full leaf is split by raw-copying the upper half of its records into
//! a freshly allocated right sibling and dropping the corresponding slots
//! from the left page. The record bytes left behind in the left page are
//! not reclaimed; the page only shrinks when it is rewritten. The
//! separator handed to the parent is the right page's first key, copied
//! into an owned buffer before the page is written, since borrowed views
//! die with the next mutation.
//!
//! A leaf holding a single record splits into an empty right page; the
//! caller (the oversized-record path in `tree`) then moves the record
//! itself. The split still returns a usable separator, the left page's
//! first key, so the parent update stays uniform.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::config::{MAX_PAGE_ID, MAX_TREE_DEPTH, PAGE_SIZE};
use crate::record::{page_insert, record_size, slot_key, write_raw_record, RecordHeader};
use crate::storage::{validate_page, Page, PageLevel, PageType};
use crate::table::TableHandle;

use super::internal::find_child;
use super::{SeparatorKey, SplitResult};

/// Descends from the root to the leaf responsible for `key`, returning
/// the leaf's page id and its loaded buffer.
pub(crate) fn find_leaf_page(table: &mut TableHandle, key: &[u8]) -> Result<(u32, Page)> {
    let mut page_id = table.root_page();
    let mut depth = 0usize;

    loop {
        ensure!(
            page_id != 0 && page_id <= MAX_PAGE_ID,
            "descent reached invalid page id {}",
            page_id
        );

        let page = table.read_page(page_id)?;
        if page.header().page_level() == PageLevel::Leaf {
            return Ok((page_id, page));
        }

        let child = find_child(&page, key)?;
        tracing::trace!(parent = page_id, child, depth, "descending");
        page_id = child;

        depth += 1;
        ensure!(
            depth <= MAX_TREE_DEPTH,
            "descent exceeded maximum depth {}",
            MAX_TREE_DEPTH
        );
    }
}

/// Inserts into an already-loaded leaf and persists it. Returns
/// `Ok(false)` without touching the page when the record does not fit.
pub(crate) fn insert_no_split(
    table: &mut TableHandle,
    page_id: u32,
    page: &mut Page,
    key: &[u8],
    value: &[u8],
) -> Result<bool> {
    if !page.can_insert(record_size(key.len(), value.len())) {
        return Ok(false);
    }

    page_insert(page, key, value)?;
    validate_page(page.as_bytes())?;
    table.write_page(page_id, page)?;
    Ok(true)
}

/// Splits a leaf: the upper half of its records moves to a new right
/// sibling, which is persisted before this returns. The caller writes the
/// trimmed left page and propagates the separator.
pub(crate) fn split_page(table: &mut TableHandle, left: &mut Page) -> Result<SplitResult> {
    ensure!(
        left.header().page_level() == PageLevel::Leaf,
        "cannot leaf-split non-leaf page {}",
        left.header().page_id()
    );
    validate_page(left.as_bytes())?;

    let total = left.header().cell_count();
    ensure!(
        total >= 1,
        "cannot split empty leaf page {}",
        left.header().page_id()
    );

    let new_page_id = table.allocate_page()?;
    let mut right = Page::init(new_page_id, PageType::Data, PageLevel::Leaf);
    right
        .header_mut()
        .set_parent_page(left.header().parent_page());

    // At least one record stays on the left; a single-record leaf splits
    // into an empty right page for the oversized-record path.
    let split_index = (total / 2).max(1);

    for i in split_index..total {
        let offset = left.slot(i)? as usize;
        let header = RecordHeader::from_bytes(&left.as_bytes()[offset..])?;
        let size = record_size(header.key_size() as usize, header.value_size() as usize);
        ensure!(
            offset + size <= PAGE_SIZE,
            "record at slot {} extends beyond page boundary",
            i
        );

        let new_offset = {
            let raw = &left.as_bytes()[offset..offset + size];
            write_raw_record(&mut right, raw)?
        };
        let position = right.header().cell_count();
        right.insert_slot(position, new_offset)?;
    }

    // Drop the moved slots from the left tail; the record bytes stay
    // behind as dead space.
    while left.header().cell_count() > split_index {
        let last = left.header().cell_count() - 1;
        left.remove_slot(last)?;
    }

    // Separator: first key of the right page, or of the left page when
    // the right came out empty. Copied before the write invalidates the
    // borrowed view.
    let separator: SeparatorKey = if right.header().cell_count() > 0 {
        SmallVec::from_slice(slot_key(&right, 0)?)
    } else {
        SmallVec::from_slice(slot_key(left, 0)?)
    };

    validate_page(right.as_bytes())?;
    table.write_page(new_page_id, &right)?;

    tracing::debug!(
        left = left.header().page_id(),
        right = new_page_id,
        moved = total - split_index,
        "split leaf page"
    );

    Ok(SplitResult {
        new_page: new_page_id,
        separator,
    })
}
