//! Page - the fixed-size unit of storage.

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// The unit of I/O between the disk manager and the buffer pool. Typed views
/// such as [`HeapPage`](super::HeapPage) interpret the bytes; `Page` itself
/// only knows about the common [`PageHeader`].
///
/// `Page` is not `Clone` outside tests: copying 4KB should be explicit.
///
/// # Example
/// ```
/// use extsortdb::storage::page::{Page, PageType};
/// use extsortdb::PageId;
///
/// let mut page = Page::new();
/// page.init(PageType::HeapData, PageId::new(7));
/// page.seal();
/// assert!(page.verify(PageId::new(7)));
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Zero the page and stamp a fresh header.
    pub fn init(&mut self, page_type: PageType, page_id: PageId) {
        self.reset();
        self.set_header(&PageHeader::new(page_type, page_id));
    }

    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Compute and store the checksum. Call after the last modification.
    pub fn seal(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// Check a page loaded from disk at `expected`.
    ///
    /// Zeroed (`Invalid`) pages carry no checksum and always pass.
    pub fn verify(&self, expected: PageId) -> bool {
        let header = self.header();
        if header.page_type == PageType::Invalid {
            return true;
        }
        header.page_id == expected && header.verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_init_stamps_header() {
        let mut page = Page::new();
        page.as_mut_slice()[500] = 0xAB;

        page.init(PageType::HeapHeader, PageId::new(3));

        assert_eq!(page.page_type(), PageType::HeapHeader);
        assert_eq!(page.header().page_id, PageId::new(3));
        assert_eq!(page.as_slice()[500], 0);
    }

    #[test]
    fn test_zeroed_page_verifies() {
        assert!(Page::new().verify(PageId::new(12)));
    }

    #[test]
    fn test_verify_rejects_wrong_id_and_corruption() {
        let mut page = Page::new();
        page.init(PageType::HeapData, PageId::new(4));
        page.as_mut_slice()[100] = 0x42;
        page.seal();

        assert!(page.verify(PageId::new(4)));
        assert!(!page.verify(PageId::new(5)));

        let mut corrupted = page.clone();
        corrupted.as_mut_slice()[100] = 0x43;
        assert!(!corrupted.verify(PageId::new(4)));
    }
}
