//! Disk Manager - page-granular file I/O.
//!
//! The [`DiskManager`] owns the database file:
//! - reading and writing whole pages
//! - allocating pages, reusing freed ones first
//! - deallocating pages back onto a free list

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     ...    N×4096
/// ```
///
/// # Free list
/// Deallocated pages are zeroed on disk and remembered in memory; the next
/// allocation takes the lowest freed id before growing the file. The free
/// list is not persisted, so pages freed in an earlier session are not
/// reused after reopening.
///
/// # Thread Safety
/// Single-threaded. The buffer pool serializes access behind a mutex.
pub struct DiskManager {
    file: File,
    page_count: u32,
    free_pages: BTreeSet<u32>,
    sync_writes: bool,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_pages: BTreeSet::new(),
            sync_writes: true,
        })
    }

    /// Open an existing database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            page_count,
            free_pages: BTreeSet::new(),
            sync_writes: true,
        })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Turn `fsync` after writes on or off.
    pub fn set_sync_writes(&mut self, sync_writes: bool) {
        self.sync_writes = sync_writes;
    }

    fn check_live(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        if self.free_pages.contains(&page_id.0) {
            return Err(Error::InvalidPageId(page_id.0));
        }
        Ok(())
    }

    fn write_at(&mut self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// - `PageNotFound` if the page is beyond the end of the file
    /// - `InvalidPageId` if the page has been deallocated
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_live(page_id)?;

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    /// Write a page that was previously allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_live(page_id)?;
        self.write_at(page_id, page.as_slice())
    }

    /// Allocate a zero-filled page and return its id.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = match self.free_pages.pop_first() {
            Some(id) => PageId::new(id),
            None => {
                if self.page_count == PageId::INVALID.0 {
                    return Err(Error::InvalidPageId(self.page_count));
                }
                self.page_count += 1;
                PageId::new(self.page_count - 1)
            }
        };

        self.write_at(page_id, &[0u8; PAGE_SIZE])?;
        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// # Errors
    /// `InvalidPageId` if the page was never allocated or is already free.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count || self.free_pages.contains(&page_id.0) {
            return Err(Error::InvalidPageId(page_id.0));
        }

        self.write_at(page_id, &[0u8; PAGE_SIZE])?;
        self.free_pages.insert(page_id.0);
        Ok(())
    }

    /// Number of pages in the file, free ones included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of deallocated pages waiting for reuse.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    /// Total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
