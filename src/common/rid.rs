//! Record identifier type.

use std::fmt;

use super::PageId;

/// Index into a heap page's slot directory.
pub type SlotId = u16;

/// Identifies a record inside a heap file: the page it lives on and its slot.
///
/// A `Rid` stays valid until the record is deleted. The page layer may hand
/// the same slot number to a later insert, so a stale `Rid` must not be used
/// after a delete.
///
/// # Example
/// ```
/// use extsortdb::{PageId, Rid};
///
/// let rid = Rid::new(PageId::new(3), 7);
/// assert_eq!(rid.to_string(), "(Page(3), 7)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl Rid {
    #[inline]
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rid_ordering_follows_page_then_slot() {
        let a = Rid::new(PageId::new(1), 9);
        let b = Rid::new(PageId::new(2), 0);
        let c = Rid::new(PageId::new(2), 1);
        assert!(a < b);
        assert!(b < c);
    }
}
