//! Frame - a slot in the buffer pool.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// Bookkeeping for whatever page currently occupies a frame.
#[derive(Debug, Default, Clone, Copy)]
struct FrameMeta {
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
}

/// A frame in the buffer pool: one page plus its pin count and dirty flag.
///
/// Page bytes sit behind a `RwLock` so guards can hand out `&Page` or
/// `&mut Page`; the metadata is small and changes together, so it shares one
/// mutex.
pub struct Frame {
    page: RwLock<Page>,
    meta: Mutex<FrameMeta>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            meta: Mutex::new(FrameMeta::default()),
        }
    }

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Bind the frame to `page_id` with a single pin and a clean page.
    pub fn assign(&self, page_id: PageId) {
        *self.meta.lock() = FrameMeta {
            page_id: Some(page_id),
            pin_count: 1,
            dirty: false,
        };
    }

    /// Forget the resident page. The bytes are left as they are.
    pub fn vacate(&self) {
        *self.meta.lock() = FrameMeta::default();
    }

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.meta.lock().page_id
    }

    /// Increment the pin count. Returns the new pin count.
    pub fn pin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count += 1;
        meta.pin_count
    }

    /// Drop one pin, folding `dirty` into the frame's dirty flag.
    /// Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the frame is not pinned.
    pub fn unpin(&self, dirty: bool) -> u32 {
        let mut meta = self.meta.lock();
        assert!(meta.pin_count > 0, "pin count underflow");
        meta.pin_count -= 1;
        meta.dirty |= dirty;
        meta.pin_count
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.meta.lock().pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.meta.lock().dirty
    }

    pub fn clear_dirty(&self) {
        self.meta.lock().dirty = false;
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_pins_once() {
        let frame = Frame::new();
        assert_eq!(frame.page_id(), None);

        frame.assign(PageId::new(8));
        assert_eq!(frame.page_id(), Some(PageId::new(8)));
        assert_eq!(frame.pin_count(), 1);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_unpin_accumulates_dirty() {
        let frame = Frame::new();
        frame.assign(PageId::new(1));
        frame.pin();

        assert_eq!(frame.unpin(true), 1);
        assert!(frame.is_dirty());

        // A later clean unpin must not wash out the earlier write.
        assert_eq!(frame.unpin(false), 0);
        assert!(frame.is_dirty());
        assert!(!frame.is_pinned());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_unpin_underflow() {
        Frame::new().unpin(false);
    }

    #[test]
    fn test_vacate() {
        let frame = Frame::new();
        frame.assign(PageId::new(3));
        frame.unpin(true);

        frame.vacate();
        assert_eq!(frame.page_id(), None);
        assert!(!frame.is_dirty());
        assert_eq!(frame.pin_count(), 0);
    }
}
