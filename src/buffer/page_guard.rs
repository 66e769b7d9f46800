//! Scoped pins on buffer pool pages.
//!
//! - [`PageReadGuard`] - shared access, unpins clean
//! - [`PageWriteGuard`] - exclusive access, unpins dirty once written through
//!
//! Dropping a guard is the only way to unpin, so every exit path of a heap
//! file operation (early `?` returns included) releases what it pinned.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::{HeapPage, Page};

use super::buffer_pool_manager::BufferPoolManager;

/// Shared pin on a page.
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Read the page as a heap page.
    pub fn heap_page(&self) -> HeapPage<&[u8]> {
        HeapPage::new(self.lock.as_slice())
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}

/// Exclusive pin on a page.
///
/// The page counts as dirty as soon as it is borrowed mutably (through
/// `DerefMut` or [`PageWriteGuard::heap_page_mut`]); a write guard that only
/// read the page unpins clean.
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
    dirty: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
        dirty: bool,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
            dirty,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn heap_page(&self) -> HeapPage<&[u8]> {
        HeapPage::new(self.lock.as_slice())
    }

    /// Modify the page as a heap page. Marks the guard dirty.
    pub fn heap_page_mut(&mut self) -> HeapPage<&mut [u8]> {
        self.dirty = true;
        HeapPage::new(self.lock.as_mut_slice())
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.dirty = true;
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, self.dirty);
    }
}
