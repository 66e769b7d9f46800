//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`]:
//! - [`PageType`] discriminator
//! - CRC32 checksum, sealed by the buffer pool on write-back
//! - the page's own id, so a page read from the wrong offset is caught

use crate::common::PageId;

/// Type of page stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
/// Freshly allocated and freed pages are all zeros and therefore `Invalid`.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Zeroed, never initialised, or freed.
    #[default]
    Invalid = 0,
    /// Sentinel first page of a heap file chain. Never holds records.
    HeapHeader = 1,
    /// Record-carrying page of a heap file chain.
    HeapData = 2,
}

impl PageType {
    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::HeapHeader,
            2 => PageType::HeapData,
            _ => PageType::Invalid,
        }
    }
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type (PageType as u8)
/// 1       4     checksum (CRC32, little-endian)
/// 5       4     page_id (own id, little-endian)
/// ```
///
/// The checksum covers the whole page with the checksum field read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
    pub page_id: PageId,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_PAGE_ID: usize = 5;

    /// Header for a page of `page_type` stored at `page_id`, not yet sealed.
    pub fn new(page_type: PageType, page_id: PageId) -> Self {
        Self {
            page_type,
            checksum: 0,
            page_id,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);

        let mut page_id = [0u8; 4];
        page_id.copy_from_slice(&data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]);

        Self {
            page_type,
            checksum: u32::from_le_bytes(checksum),
            page_id: PageId::from_le_bytes(page_id),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_PAGE_ID..Self::OFFSET_PAGE_ID + 4]
            .copy_from_slice(&self.page_id.to_le_bytes());
    }

    /// CRC32 of a full page, feeding zeros in place of the checksum field.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Whether the stored checksum matches the page contents.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    #[test]
    fn test_page_type_from_u8() {
        assert_eq!(PageType::from_u8(0), PageType::Invalid);
        assert_eq!(PageType::from_u8(1), PageType::HeapHeader);
        assert_eq!(PageType::from_u8(2), PageType::HeapData);
        assert_eq!(PageType::from_u8(200), PageType::Invalid);
    }

    #[test]
    fn test_page_header_byte_layout() {
        let header = PageHeader {
            page_type: PageType::HeapData,
            checksum: 0x04030201,
            page_id: PageId::new(0x0807_0605),
        };

        let mut buffer = [0u8; PageHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer, [2, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(PageHeader::from_bytes(&buffer), header);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let before = PageHeader::compute_checksum(&page_data);
        page_data[1..5].copy_from_slice(&[0xFF; 4]);
        let after = PageHeader::compute_checksum(&page_data);

        assert_eq!(before, after);
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut page_data = [0u8; PAGE_SIZE];
        page_data[100] = 0xAB;

        let header = PageHeader {
            checksum: PageHeader::compute_checksum(&page_data),
            ..PageHeader::new(PageType::HeapData, PageId::new(0))
        };
        assert!(header.verify_checksum(&page_data));

        page_data[2000] = 0x01;
        assert!(!header.verify_checksum(&page_data));
    }
}
