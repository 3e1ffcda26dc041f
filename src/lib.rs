//! # wrendb - Embedded Single-File Storage Engine
//!
//! wrendb is the storage engine of a relational database prototype: a
//! disk-backed B+ tree over fixed-size slotted pages, one file per table.
//! It turns a sequence of `insert(key, value)` / `search(key)` requests
//! into durable, ordered, page-granular updates of a database file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use wrendb::TableHandle;
//!
//! let mut table = TableHandle::create("data", "users")?;
//! table.insert(b"alice", b"{\"age\": 20}")?;
//!
//! let mut table = TableHandle::open("data", "users")?;
//! assert!(table.search(b"alice")?.is_some());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │    Table API (TableHandle)           │
//! ├─────────────────────────────────────┤
//! │    B+ Tree (search / insert /        │
//! │    splits / root management)         │
//! ├─────────────────────────────────────┤
//! │    Record Codec (records, entries,   │
//! │    key comparison, slot search)      │
//! ├─────────────────────────────────────┤
//! │    Page Primitives (header, slots)   │
//! ├─────────────────────────────────────┤
//! │    DiskManager (paged file I/O)      │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Format
//!
//! A table file is an array of 8 KiB pages. Page 0 is the META page and
//! carries the root page id plus the allocation cursor; every other page
//! is a B+ tree node. All multi-byte integers on disk are little-endian.
//!
//! ```text
//! data/users.db
//! ├── page 0   META   (root_page, next_free_page)
//! ├── page 1   DATA   leaf: sorted (key, value) records
//! ├── page 2   DATA   leaf
//! └── page 3   INDEX  internal: separators + child pointers
//! ```
//!
//! ## Guarantees and Non-Goals
//!
//! Every page write is synced before the engine moves on, and within one
//! insert pages are persisted children-first, meta page last. There is no
//! write-ahead log, no deletion, no range scans, no free-page reuse and
//! no concurrency control: one logical operation at a time per handle.
//!
//! ## Module Overview
//!
//! - [`storage`]: paged file I/O and page primitives
//! - [`record`]: record/entry codecs and slotted key search
//! - [`btree`]: the B+ tree itself
//! - [`table`]: table files, meta page, page allocation
//! - [`config`]: page geometry and engine limits

#[macro_use]
mod macros;

pub mod btree;
pub mod config;
pub mod record;
pub mod storage;
pub mod table;

pub use table::{create_table, open_table, table_file_path, TableHandle};
