//! # Disk Manager
//!
//! This module implements `DiskManager`, which presents one file as an
//! array of fixed-size pages addressed by page id. It is the only component
//! that touches the file system; everything above it works on in-memory
//! [`Page`](super::Page) buffers.
//!
//! ## Semantics
//!
//! - `read_page` seeks to `page_id * PAGE_SIZE` and reads exactly one page,
//!   looping over short reads. Reading past the end of the file yields
//!   zeroes for the missing tail, which is how a just-allocated page
//!   appears before its first write.
//! - `write_page` extends the file when writing past its current end, then
//!   writes the full page and syncs. A `write_page` that returns `Ok` is
//!   durable.
//! - `flush` forces any buffered writes to stable storage.
//!
//! ## File Format
//!
//! Database files are simply concatenated pages:
//!
//! ```text
//! Offset 0:       Page 0 (meta)
//! Offset 8192:    Page 1
//! Offset 16384:   Page 2
//! ...
//! ```
//!
//! The file length is always a multiple of `PAGE_SIZE`.
//!
//! ## Error Handling
//!
//! All fallible operations return `eyre::Result` with context naming the
//! operation, the file path and the page id involved. I/O errors are fatal
//! to the current engine operation; there are no retries.
//!
//! ## Concurrency
//!
//! `DiskManager` assumes exclusive ownership of its file. Behavior under
//! concurrent access from multiple handles or processes is undefined.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use crate::config::{MAX_PAGE_ID, PAGE_SIZE};

#[derive(Debug)]
pub struct DiskManager {
    file: File,
    path: PathBuf,
}

impl DiskManager {
    /// Creates a table file, truncating any previous contents.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        Ok(Self { file, path })
    }

    /// Opens an existing table file for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads page `page_id` into `buf`. Bytes past the end of the file read
    /// as zeroes.
    pub fn read_page(&mut self, page_id: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        ensure!(
            page_id <= MAX_PAGE_ID,
            "page {} out of bounds (max {})",
            page_id,
            MAX_PAGE_ID
        );

        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| {
                format!(
                    "failed to seek to page {} in '{}'",
                    page_id,
                    self.path.display()
                )
            })?;

        let mut total = 0usize;
        while total < PAGE_SIZE {
            let n = self.file.read(&mut buf[total..]).wrap_err_with(|| {
                format!(
                    "failed to read page {} from '{}'",
                    page_id,
                    self.path.display()
                )
            })?;
            if n == 0 {
                break;
            }
            total += n;
        }

        if total < PAGE_SIZE {
            buf[total..].fill(0);
        }

        Ok(())
    }

    /// Writes `buf` as page `page_id`, extending the file first when the
    /// write lands past the current end. Syncs before returning.
    pub fn write_page(&mut self, page_id: u32, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        ensure!(
            page_id <= MAX_PAGE_ID,
            "page {} out of bounds (max {})",
            page_id,
            MAX_PAGE_ID
        );

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let required = offset + PAGE_SIZE as u64;

        let current = self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?
            .len();

        if current < required {
            self.file.set_len(required).wrap_err_with(|| {
                format!(
                    "failed to extend '{}' to {} bytes",
                    self.path.display(),
                    required
                )
            })?;
        }

        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| {
                format!(
                    "failed to seek to page {} in '{}'",
                    page_id,
                    self.path.display()
                )
            })?;

        self.file.write_all(buf).wrap_err_with(|| {
            format!(
                "failed to write page {} to '{}'",
                page_id,
                self.path.display()
            )
        })?;

        self.file.sync_data().wrap_err_with(|| {
            format!(
                "failed to sync '{}' after writing page {}",
                self.path.display(),
                page_id
            )
        })?;

        Ok(())
    }

    /// Forces buffered writes to stable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .wrap_err_with(|| format!("failed to flush '{}'", self.path.display()))
    }

    pub fn file_size(&self) -> Result<u64> {
        Ok(self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?
            .len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_open_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        let mut dm = DiskManager::create(&path).unwrap();
        let mut page = [0u8; PAGE_SIZE];
        page[0] = 0xAB;
        page[PAGE_SIZE - 1] = 0xCD;
        dm.write_page(0, &page).unwrap();
        drop(dm);

        let mut dm = DiskManager::open(&path).unwrap();
        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(0, &mut out).unwrap();
        assert_eq!(out[0], 0xAB);
        assert_eq!(out[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = DiskManager::open(dir.path().join("missing.db"));

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("failed to open"));
    }

    #[test]
    fn read_past_eof_zero_fills() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("t.db")).unwrap();

        let mut out = [0xFFu8; PAGE_SIZE];
        dm.read_page(3, &mut out).unwrap();

        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn write_past_eof_extends_file() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("t.db")).unwrap();

        let page = [0x11u8; PAGE_SIZE];
        dm.write_page(4, &page).unwrap();

        assert_eq!(dm.file_size().unwrap(), 5 * PAGE_SIZE as u64);

        // The skipped pages read as zeroes.
        let mut out = [0xFFu8; PAGE_SIZE];
        dm.read_page(2, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));

        dm.read_page(4, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn file_length_is_page_aligned() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("t.db")).unwrap();

        dm.write_page(0, &[0u8; PAGE_SIZE]).unwrap();
        dm.write_page(2, &[0u8; PAGE_SIZE]).unwrap();

        assert_eq!(dm.file_size().unwrap() % PAGE_SIZE as u64, 0);
    }

    #[test]
    fn rejects_page_id_beyond_sanity_limit() {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("t.db")).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        assert!(dm.read_page(MAX_PAGE_ID + 1, &mut buf).is_err());
        assert!(dm.write_page(MAX_PAGE_ID + 1, &buf).is_err());
    }
}
