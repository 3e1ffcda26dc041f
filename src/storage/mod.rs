//! # Storage Module
//!
//! This module provides the foundational storage layer for wrendb: a disk
//! manager that treats one file as an array of fixed-size pages, and the
//! page primitives (header views and slot directory operations) that the
//! B+ tree is built on.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      B+ Tree (btree module)          │
//! ├─────────────────────────────────────┤
//! │  Record Codec (record module)        │
//! ├─────────────────────────────────────┤
//! │  Page primitives (storage::page)     │
//! ├─────────────────────────────────────┤
//! │  DiskManager (storage::disk)         │
//! └─────────────────────────────────────┘
//! ```
//!
//! The disk manager knows nothing about page contents; it moves opaque
//! `PAGE_SIZE` buffers between memory and the file, extending the file on
//! writes past the end and zero-filling reads past the end. The page layer
//! gives those buffers structure: a fixed 40-byte header, a record area
//! growing upward and a slot directory growing downward.
//!
//! ## Durability
//!
//! `write_page` syncs before returning, so every page write that succeeds
//! is durable. The B+ tree relies on this for its write ordering: children
//! are persisted before the parents that reference them, and the meta page
//! is rewritten last when the root moves.
//!
//! ## Module Organization
//!
//! - `disk`: file-backed paged I/O (`DiskManager`)
//! - `page`: page buffer, header layout, slot directory primitives

mod disk;
mod page;

pub use disk::DiskManager;
pub use page::{validate_page, Page, PageHeader, PageLevel, PageType};

pub use crate::config::{PAGE_HEADER_SIZE, PAGE_SIZE};
