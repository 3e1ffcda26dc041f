//! # Configuration Constants
//!
//! This module centralizes all configuration constants, grouping
//! interdependent values together and documenting their relationships.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (8192 bytes)
//!       │
//!       ├─> PAGE_HEADER_SIZE (40 bytes, fixed; pinned to the PageHeader
//!       │   struct by a compile-time assert in storage::page)
//!       │
//!       ├─> PAGE_USABLE_SIZE (derived: PAGE_SIZE - PAGE_HEADER_SIZE)
//!       │
//!       └─> SLOT_SIZE (2 bytes per slot directory entry)
//!             The slot directory occupies [free_end, PAGE_SIZE), so
//!             free_end + SLOT_SIZE * cell_count == PAGE_SIZE always.
//!
//! MAX_KEY_SIZE (255)
//!       │
//!       └─> A maximal-key record with an empty value must fit a fresh
//!           page together with its slot (asserted below), otherwise the
//!           key-size check alone cannot guarantee insertability.
//!
//! MAX_PAGE_ID (1,000,000) and MAX_TREE_DEPTH (100)
//!       │
//!       └─> Descent sanity limits: a child pointer outside
//!           [1, MAX_PAGE_ID] or a root-to-leaf path longer than
//!           MAX_TREE_DEPTH is treated as tree corruption.
//! ```
//!
//! ## Page Size Choice
//!
//! The page size is a build-time constant; 4 KiB and 8 KiB are both
//! reasonable. wrendb uses 8 KiB so that a single record with a value of
//! several kilobytes can still occupy a page by itself instead of being
//! unrepresentable.

/// Size of a page in bytes. The unit of all disk I/O.
pub const PAGE_SIZE: usize = 8192;

/// Size of the fixed page header at offset 0 of every page.
pub const PAGE_HEADER_SIZE: usize = 40;

/// Bytes available for records and the slot directory on a page.
pub const PAGE_USABLE_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Size of one slot directory entry (a little-endian u16 record offset).
pub const SLOT_SIZE: usize = 2;

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 255;

/// Largest page id the engine will follow during descent. Child pointers
/// beyond this are treated as corruption.
pub const MAX_PAGE_ID: u32 = 1_000_000;

/// Maximum root-to-leaf path length before descent is declared corrupt.
pub const MAX_TREE_DEPTH: usize = 100;

/// File extension for table files.
pub const TABLE_FILE_EXTENSION: &str = "db";

/// Default directory for table files ("data/<table>.db").
pub const DEFAULT_DATA_DIR: &str = "data";

const _: () = assert!(PAGE_SIZE.is_power_of_two());
const _: () = assert!(PAGE_USABLE_SIZE == PAGE_SIZE - PAGE_HEADER_SIZE);
const _: () = assert!(PAGE_HEADER_SIZE < PAGE_SIZE);
// A record holding a maximal key and an empty value, plus its slot, fits a
// fresh page. 5 is the leaf record header size, pinned in `record`.
const _: () = assert!(5 + MAX_KEY_SIZE + SLOT_SIZE <= PAGE_USABLE_SIZE);
const _: () = assert!(MAX_KEY_SIZE <= u8::MAX as usize);
