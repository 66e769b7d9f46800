//! Page identifier type.

use std::fmt;

/// Identifies a page in the database file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. Heap pages store the id of
/// their successor in the chain, with [`PageId::INVALID`] terminating it.
///
/// # Example
/// ```
/// use extsortdb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// End-of-chain / "no page" sentinel.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Little-endian encoding used inside page headers and the catalog.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Inverse of [`PageId::to_le_bytes`].
    #[inline]
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        PageId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert!(PageId::new(0).is_valid());
    }

    #[test]
    fn test_page_id_le_bytes() {
        let pid = PageId::new(0x0403_0201);
        assert_eq!(pid.to_le_bytes(), [1, 2, 3, 4]);
        assert_eq!(PageId::from_le_bytes([1, 2, 3, 4]), pid);
        assert_eq!(PageId::from_le_bytes([0xFF; 4]), PageId::INVALID);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }
}
