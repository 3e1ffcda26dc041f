//! # Table Handle and Meta Page
//!
//! One table, one file. `TableHandle` owns the disk manager for a table
//! file and caches the B+ tree's root page id; everything else about the
//! table lives on disk.
//!
//! ## Meta Page
//!
//! Page 0 of every table file is the META page. Its header carries the
//! two file-level facts the engine needs:
//!
//! - `root_page`: the B+ tree root, 0 while the tree is empty
//! - `next_free_page`: the next page id `allocate_page` will hand out
//!
//! The meta page is the sole authority for the root: the root page
//! itself carries no duplicate pointer, and the handle's cached copy is
//! refreshed whenever the root moves. Page ids are dense and monotonic;
//! freed pages are never reused (deletion is not supported).
//!
//! ## File Naming
//!
//! A table named `users` lives at `<base_dir>/users.db`; the default
//! base directory is `data/`.
//!
//! ## Concurrency
//!
//! A handle owns exclusive access to its file. At most one logical
//! operation runs against a handle at a time; sharing a table file
//! between handles or processes is undefined behavior.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::btree;
use crate::config::{DEFAULT_DATA_DIR, MAX_PAGE_ID, TABLE_FILE_EXTENSION};
use crate::storage::{DiskManager, Page, PageLevel, PageType};

/// Returns the path of a table's file under `base_dir`.
pub fn table_file_path(base_dir: &Path, name: &str) -> PathBuf {
    base_dir.join(format!("{}.{}", name, TABLE_FILE_EXTENSION))
}

#[derive(Debug)]
pub struct TableHandle {
    disk: DiskManager,
    root_page: u32,
}

impl TableHandle {
    /// Creates a table file under `base_dir` (creating the directory when
    /// needed) and writes a fresh meta page. An existing table of the
    /// same name is truncated.
    pub fn create<P: AsRef<Path>>(base_dir: P, name: &str) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir).wrap_err_with(|| {
            format!("failed to create data directory '{}'", base_dir.display())
        })?;

        let path = table_file_path(base_dir, name);
        let mut disk = DiskManager::create(&path)?;

        let mut meta = Page::init(0, PageType::Meta, PageLevel::Leaf);
        {
            let header = meta.header_mut();
            header.set_root_page(0);
            header.set_next_free_page(1);
        }
        disk.write_page(0, meta.as_bytes())?;

        tracing::debug!(table = name, path = %path.display(), "created table");
        Ok(Self { disk, root_page: 0 })
    }

    /// Opens an existing table by reading and verifying its meta page.
    pub fn open<P: AsRef<Path>>(base_dir: P, name: &str) -> Result<Self> {
        let path = table_file_path(base_dir.as_ref(), name);
        let mut disk = DiskManager::open(&path)?;

        let mut meta = Page::zeroed();
        disk.read_page(0, meta.as_bytes_mut())?;
        ensure!(
            meta.header().page_type() == PageType::Meta,
            "page 0 of '{}' is not a meta page",
            path.display()
        );

        let root_page = meta.header().root_page();
        ensure!(
            root_page <= MAX_PAGE_ID,
            "meta page of '{}' has implausible root page {}",
            path.display(),
            root_page
        );

        Ok(Self { disk, root_page })
    }

    /// The cached root page id; 0 while the tree is empty.
    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// Reads one page from disk into an owned buffer.
    pub fn read_page(&mut self, page_id: u32) -> Result<Page> {
        let mut page = Page::zeroed();
        self.disk.read_page(page_id, page.as_bytes_mut())?;

        // A never-written page reads as zeroes; anything else must agree
        // about its own id.
        let header = page.header();
        if header.page_type() != PageType::Unknown {
            ensure!(
                header.page_id() == page_id,
                "page {} carries mismatched id {} in its header",
                page_id,
                header.page_id()
            );
        }

        Ok(page)
    }

    /// Persists one page. Durable once this returns.
    pub fn write_page(&mut self, page_id: u32, page: &Page) -> Result<()> {
        self.disk.write_page(page_id, page.as_bytes())
    }

    /// Hands out the next page id and persists the bumped allocation
    /// cursor in the meta page.
    pub fn allocate_page(&mut self) -> Result<u32> {
        let mut meta = self.read_page(0)?;
        ensure!(
            meta.header().page_type() == PageType::Meta,
            "page 0 is not a meta page"
        );

        let page_id = meta.header().next_free_page();
        ensure!(
            page_id >= 1 && page_id <= MAX_PAGE_ID,
            "page allocator exhausted or corrupt (next_free_page={})",
            page_id
        );

        meta.header_mut().set_next_free_page(page_id + 1);
        self.write_page(0, &meta)?;

        tracing::debug!(page_id, "allocated page");
        Ok(page_id)
    }

    /// Points the meta page (and the cached copy) at a new root. Called
    /// after the new root and its children are already on disk.
    pub(crate) fn set_root(&mut self, root_page: u32) -> Result<()> {
        let mut meta = self.read_page(0)?;
        meta.header_mut().set_root_page(root_page);
        self.write_page(0, &meta)?;
        self.root_page = root_page;
        Ok(())
    }

    /// Inserts a key-value pair; `Ok(false)` when the key already exists.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<bool> {
        btree::insert(self, key, value)
    }

    /// Looks up a key, returning an owned copy of the value.
    pub fn search(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        btree::search(self, key)
    }

    /// Forces buffered writes to stable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.disk.flush()
    }

    pub fn file_size(&self) -> Result<u64> {
        self.disk.file_size()
    }
}

/// Creates the table `name` under the default data directory.
pub fn create_table(name: &str) -> Result<TableHandle> {
    TableHandle::create(DEFAULT_DATA_DIR, name)
}

/// Opens the table `name` from the default data directory.
pub fn open_table(name: &str) -> Result<TableHandle> {
    TableHandle::open(DEFAULT_DATA_DIR, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use tempfile::tempdir;

    #[test]
    fn create_writes_only_the_meta_page() {
        let dir = tempdir().unwrap();
        let table = TableHandle::create(dir.path(), "users").unwrap();

        assert_eq!(table.root_page(), 0);
        assert_eq!(table.file_size().unwrap(), PAGE_SIZE as u64);
        assert!(table_file_path(dir.path(), "users").exists());
    }

    #[test]
    fn create_makes_the_data_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        TableHandle::create(&nested, "t").unwrap();

        assert!(table_file_path(&nested, "t").exists());
    }

    #[test]
    fn open_reads_meta_back() {
        let dir = tempdir().unwrap();
        {
            let mut table = TableHandle::create(dir.path(), "t").unwrap();
            table.insert(b"k", b"v").unwrap();
        }

        let table = TableHandle::open(dir.path(), "t").unwrap();
        assert_eq!(table.root_page(), 1);
    }

    #[test]
    fn open_missing_table_fails() {
        let dir = tempdir().unwrap();

        assert!(TableHandle::open(dir.path(), "absent").is_err());
    }

    #[test]
    fn open_rejects_non_meta_page_zero() {
        let dir = tempdir().unwrap();
        let path = table_file_path(dir.path(), "bad");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&path, vec![0xFFu8; PAGE_SIZE]).unwrap();

        let result = TableHandle::open(dir.path(), "bad");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a meta page"));
    }

    #[test]
    fn allocate_page_bumps_and_persists_the_cursor() {
        let dir = tempdir().unwrap();
        let mut table = TableHandle::create(dir.path(), "t").unwrap();

        assert_eq!(table.allocate_page().unwrap(), 1);
        assert_eq!(table.allocate_page().unwrap(), 2);
        assert_eq!(table.allocate_page().unwrap(), 3);

        drop(table);
        let mut table = TableHandle::open(dir.path(), "t").unwrap();
        assert_eq!(table.allocate_page().unwrap(), 4);
    }

    #[test]
    fn create_truncates_an_existing_table() {
        let dir = tempdir().unwrap();
        {
            let mut table = TableHandle::create(dir.path(), "t").unwrap();
            for i in 0..20u32 {
                table
                    .insert(format!("key{}", i).as_bytes(), &[0u8; 300])
                    .unwrap();
            }
        }

        let mut table = TableHandle::create(dir.path(), "t").unwrap();
        assert_eq!(table.root_page(), 0);
        assert_eq!(table.file_size().unwrap(), PAGE_SIZE as u64);
        assert_eq!(table.search(b"key0").unwrap(), None);
    }

    #[test]
    fn read_page_rejects_mismatched_header_id() {
        let dir = tempdir().unwrap();
        let mut table = TableHandle::create(dir.path(), "t").unwrap();
        let id = table.allocate_page().unwrap();

        // Write a page that claims a different id.
        let page = Page::init(id + 7, PageType::Data, PageLevel::Leaf);
        table.write_page(id, &page).unwrap();

        let result = table.read_page(id);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("mismatched id"));
    }
}
