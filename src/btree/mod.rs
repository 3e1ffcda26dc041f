//! # B+ Tree Implementation
//!
//! This module implements the disk-backed B+ tree at the core of wrendb:
//! an ordered key-value index over slotted pages, persisted one page per
//! write through the disk manager.
//!
//! ## Node Types
//!
//! - **Leaf pages** (`DATA`, level `LEAF`) store the actual key-value
//!   records in key order.
//! - **Internal pages** (`INDEX`, level `INTERNAL`) store separator keys
//!   and child page ids. The entry at position `i` holds the right child
//!   of key `i` (the subtree for keys >= key `i`); the child for keys
//!   below the first separator lives in the header's `leftmost_child`.
//!
//! ```text
//!                    [Internal page]
//!        leftmost /     |k0       |k1 \
//!         [Leaf A]   [Leaf B]   [Leaf C]
//!        keys < k0  k0 <= k < k1  keys >= k1
//! ```
//!
//! ## Insert Algorithm
//!
//! ```text
//! 1. Descend from the root, choosing the child whose range contains the
//!    key (ties descend right).
//! 2. At the leaf: reject duplicates, insert in place when it fits.
//! 3. Otherwise split the leaf, place the new record in the half chosen
//!    by comparing against the separator, and insert the separator into
//!    the parent.
//! 4. Parent inserts split internal pages as needed; a split that reaches
//!    the root allocates a new root.
//! ```
//!
//! ## Write Ordering
//!
//! Within one insert, every page is persisted before a page that points
//! at it: a split writes the new right page before the parent learns its
//! id, and a root change rewrites the meta page only after the new root
//! and its children's parent pointers are on disk. `write_page` syncs, so
//! the ordering is durable, not merely buffered.
//!
//! ## What This Tree Does Not Do
//!
//! No deletion, no range scans, no free-page reuse, no latching, and no
//! write-ahead logging. Record bytes moved out of a page during a split
//! stay behind as dead space; pages only shrink by being rewritten.
//!
//! ## Module Organization
//!
//! - `leaf`: root-to-leaf descent, leaf insert, leaf split
//! - `internal`: child lookup, internal insert/split, root creation,
//!   parent propagation
//! - `tree`: the public `search`/`insert` entry points

mod internal;
mod leaf;
mod tree;

use smallvec::SmallVec;

pub use tree::{insert, search};

/// An owned copy of a separator key, sized so the 255-byte maximum never
/// spills to the heap.
pub(crate) type SeparatorKey = SmallVec<[u8; 256]>;

/// Outcome of splitting a page: the new right sibling and the separator
/// key to insert into the parent.
#[derive(Debug)]
pub(crate) struct SplitResult {
    pub new_page: u32,
    pub separator: SeparatorKey,
}
