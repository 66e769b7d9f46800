//! Buffer Pool Manager - the page store under every heap file.
//!
//! The [`BufferPoolManager`] provides:
//! - pin/unpin through scoped guards
//! - dirty-page write-back with checksum sealing
//! - page allocation and freeing on top of the [`DiskManager`]
//! - LRU eviction of unpinned pages

use std::collections::HashMap;

use log::{debug, trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Integrity
/// Every write-back seals the page checksum into a copy of the page. Loading
/// a page whose checksum or embedded page id does not match fails with
/// `ChecksumMismatch` instead of handing out garbage.
///
/// # Usage
/// ```ignore
/// let bpm = BufferPoolManager::new(16, DiskManager::create("test.db")?);
///
/// let mut guard = bpm.new_page()?;
/// guard.as_mut_slice()[0] = 0xAB;
/// let pid = guard.page_id();
/// drop(guard); // unpinned, dirty
///
/// bpm.free_page(pid)?;
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,
    replacer: Mutex<LruReplacer>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: pin pages
    // ========================================================================

    /// Pin a page for reading.
    ///
    /// # Errors
    /// - `PageNotFound` / `InvalidPageId` if the page is not allocated
    /// - `NoFreeFrames` if every frame is pinned
    /// - `ChecksumMismatch` if the page on disk is corrupted
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page for writing. Errors as for [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, false))
    }

    // ========================================================================
    // Public API: allocate and free pages
    // ========================================================================

    /// Allocate a zeroed page on disk and pin it for writing.
    ///
    /// The returned guard is already dirty so the page reaches disk even if
    /// the caller never writes to it.
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let allocated = self.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(pid) => pid,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.assign(page_id);
        self.install(page_id, frame_id);
        BufferPoolStats::bump(&self.stats.pages_allocated);
        trace!("allocated {} in {}", page_id, frame_id);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock, true))
    }

    /// Drop a page from the pool and deallocate it on disk.
    ///
    /// # Errors
    /// - `PagePinned` if a guard on the page is still alive
    /// - `InvalidPageId` if the page is not allocated on disk
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        {
            let mut pt = self.page_table.write();
            if let Some(&frame_id) = pt.get(&page_id) {
                let frame = &self.frames[frame_id.0];
                if frame.is_pinned() {
                    return Err(Error::PagePinned(page_id.0));
                }
                pt.remove(&page_id);
                frame.vacate();
                self.replacer.lock().remove(frame_id);
                self.free_list.lock().push(frame_id);
            }
        }

        self.disk_manager.lock().deallocate_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_freed);
        trace!("freed {}", page_id);
        Ok(())
    }

    // ========================================================================
    // Public API: flush pages
    // ========================================================================

    /// Write a resident page to disk if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = match self.page_table.read().get(&page_id) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Write every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of pages resident in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of frames with at least one live guard.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    /// Pin count of a resident page, `None` if it is not in the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let pt = self.page_table.read();
        pt.get(&page_id).map(|fid| self.frames[fid.0].pin_count())
    }

    /// Pages in the database file, including freed ones awaiting reuse.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    /// Freed pages awaiting reuse.
    pub fn disk_free_page_count(&self) -> usize {
        self.disk_manager.lock().free_page_count()
    }

    // ========================================================================
    // Internal: called by guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let remaining = self.frames[frame_id.0].unpin(is_dirty);
        if remaining == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let resident = self.page_table.read().get(&page_id).copied();
        match resident {
            Some(frame_id) => {
                self.frames[frame_id.0].pin();
                self.touch(frame_id);
                BufferPoolStats::bump(&self.stats.cache_hits);
                Ok(frame_id)
            }
            None => self.load_page(page_id),
        }
    }

    /// Cache miss: read the page into a frame and verify it.
    fn load_page(&self, page_id: PageId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let frame_id = self.get_free_frame()?;

        let loaded = self.disk_manager.lock().read_page(page_id);
        let page = match loaded {
            Ok(page) if page.verify(page_id) => page,
            Ok(_) => {
                warn!("checksum mismatch reading {}", page_id);
                self.free_list.lock().push(frame_id);
                return Err(Error::ChecksumMismatch(page_id.0));
            }
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_read);

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page.as_slice());
        frame.assign(page_id);
        self.install(page_id, frame_id);

        Ok(frame_id)
    }

    /// Map `page_id` to a freshly assigned (pinned) frame.
    fn install(&self, page_id: PageId, frame_id: FrameId) {
        self.page_table.write().insert(page_id, frame_id);
        self.touch(frame_id);
    }

    fn touch(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    // ========================================================================
    // Internal: frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }
        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
        BufferPoolStats::bump(&self.stats.evictions);

        let frame = &self.frames[frame_id.0];
        if let Some(pid) = frame.page_id() {
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Put the victim back so the page is not lost from the pool.
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
            debug!("evicted {} from {}", pid, frame_id);
        }

        frame.vacate();
        Ok(frame_id)
    }

    /// Seal and write a frame's page if it is dirty.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if !frame.is_dirty() {
            return Ok(());
        }

        let mut sealed = Page::new();
        sealed
            .as_mut_slice()
            .copy_from_slice(frame.page().as_slice());
        sealed.seal();

        self.disk_manager.lock().write_page(page_id, &sealed)?;
        frame.clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageType;
    use tempfile::tempdir;

    fn create_test_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        dm.set_sync_writes(false);
        (BufferPoolManager::new(pool_size, dm), dir)
    }

    #[test]
    fn test_new_page_ids_are_sequential() {
        let (bpm, _dir) = create_test_bpm(10);

        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(0));
        assert_eq!(bpm.new_page().unwrap().page_id(), PageId::new(1));
        assert_eq!(bpm.stats().snapshot().pages_allocated, 2);
    }

    #[test]
    fn test_write_then_read() {
        let (bpm, _dir) = create_test_bpm(10);

        let pid = {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = 0xCD;
            guard.page_id()
        };

        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.as_slice()[0], 0xCD);
    }

    #[test]
    fn test_dirty_page_survives_eviction() {
        let (bpm, _dir) = create_test_bpm(1);

        {
            let mut guard = bpm.new_page().unwrap();
            let pid = guard.page_id();
            guard.init(PageType::HeapData, pid);
            guard.as_mut_slice()[100] = 0x42;
        }
        let _ = bpm.new_page().unwrap();

        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap();
        assert_eq!(guard.as_slice()[100], 0x42);
        assert!(bpm.stats().snapshot().evictions >= 1);
    }

    #[test]
    fn test_clean_write_guard_is_not_written_back() {
        let (bpm, _dir) = create_test_bpm(2);

        let pid = bpm.new_page().unwrap().page_id();
        bpm.flush_all_pages().unwrap();
        let written = bpm.stats().snapshot().pages_written;

        {
            let guard = bpm.fetch_page_write(pid).unwrap();
            assert!(!guard.is_dirty());
        }
        bpm.flush_all_pages().unwrap();

        assert_eq!(bpm.stats().snapshot().pages_written, written);
    }

    #[test]
    fn test_no_free_frames() {
        let (bpm, _dir) = create_test_bpm(2);

        let _guard1 = bpm.new_page().unwrap();
        let _guard2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
        // The failed call must not leak a frame or a pin.
        assert_eq!(bpm.pinned_frame_count(), 2);
    }

    #[test]
    fn test_pin_counts_follow_guards() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();
        assert_eq!(bpm.pin_count(pid), Some(0));

        let a = bpm.fetch_page_read(pid).unwrap();
        let b = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(bpm.pin_count(pid), Some(2));

        drop(a);
        drop(b);
        assert_eq!(bpm.pin_count(pid), Some(0));
        assert_eq!(bpm.pinned_frame_count(), 0);
    }

    #[test]
    fn test_free_page() {
        let (bpm, _dir) = create_test_bpm(4);
        let pid = bpm.new_page().unwrap().page_id();

        bpm.free_page(pid).unwrap();

        assert_eq!(bpm.page_count(), 0);
        assert_eq!(bpm.free_frame_count(), 4);
        assert_eq!(bpm.disk_free_page_count(), 1);
        assert!(bpm.fetch_page_read(pid).is_err());
        assert_eq!(bpm.new_page().unwrap().page_id(), pid);
    }

    #[test]
    fn test_free_pinned_page_fails() {
        let (bpm, _dir) = create_test_bpm(4);
        let guard = bpm.new_page().unwrap();
        let pid = guard.page_id();

        assert!(matches!(bpm.free_page(pid), Err(Error::PagePinned(_))));
        drop(guard);
        assert!(bpm.free_page(pid).is_ok());
        assert!(matches!(bpm.free_page(pid), Err(Error::InvalidPageId(_))));
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let (bpm, _dir) = create_test_bpm(2);
        assert!(matches!(
            bpm.fetch_page_read(PageId::INVALID),
            Err(Error::InvalidPageId(_))
        ));
        assert!(matches!(
            bpm.fetch_page_read(PageId::new(9)),
            Err(Error::PageNotFound(9))
        ));
        assert_eq!(bpm.free_frame_count(), 2);
    }
}
