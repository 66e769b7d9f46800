//! Slotted page format for heap file records.
//!
//! # Layout
//! ```text
//! +----------------------+ 0
//! |    PageHeader        |  9 bytes (type, checksum, own id)
//! +----------------------+ 9
//! |  next_page     u32   |  INVALID terminates the chain
//! |  record_count  u16   |
//! |  slot_count    u16   |
//! |  free_end      u16   |  start of the record area
//! +----------------------+ 19
//! |  slot directory      |  4 bytes per slot (offset u16, length u16),
//! |        ...           |  grows toward the end of the page
//! +----------------------+
//! |     free space       |
//! +----------------------+ free_end
//! |     record data      |  grows toward the start of the page
//! +----------------------+ PAGE_SIZE
//! ```
//!
//! A deleted slot keeps its directory entry with offset `0xFFFF` and is
//! handed out again by a later insert. Space freed by deletes is reclaimed by
//! compacting the record area when an insert would not otherwise fit.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, Rid, SlotId};

use super::page_header::{PageHeader, PageType};

const OFFSET_NEXT_PAGE: usize = PageHeader::SIZE;
const OFFSET_RECORD_COUNT: usize = OFFSET_NEXT_PAGE + 4;
const OFFSET_SLOT_COUNT: usize = OFFSET_RECORD_COUNT + 2;
const OFFSET_FREE_END: usize = OFFSET_SLOT_COUNT + 2;

/// Offset of slot 0 in the directory.
pub const SLOT_DIR_START: usize = OFFSET_FREE_END + 2;

/// Bytes per slot directory entry.
pub const SLOT_SIZE: usize = 4;

/// Largest record an empty page can hold.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOT_DIR_START - SLOT_SIZE;

const FREE_SLOT: u16 = 0xFFFF;

/// A view of a page's bytes as a heap page.
///
/// Read operations work on any `B: AsRef<[u8]>` (e.g. `&[u8]` from a read
/// guard); mutations additionally need `B: AsMut<[u8]>`.
///
/// # Example
/// ```
/// use extsortdb::storage::page::{HeapPage, PageType};
/// use extsortdb::PageId;
///
/// let mut bytes = vec![0u8; extsortdb::PAGE_SIZE];
/// let mut page = HeapPage::new(&mut bytes[..]);
/// page.init(PageType::HeapData, PageId::new(1));
///
/// let slot = page.insert_record(b"hello").unwrap();
/// assert_eq!(page.record(slot).unwrap(), b"hello");
/// ```
pub struct HeapPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HeapPage<B> {
    pub fn new(data: B) -> Self {
        debug_assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes()[offset], self.bytes()[offset + 1]])
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.bytes()[PageHeader::OFFSET_PAGE_TYPE])
    }

    pub fn page_id(&self) -> PageId {
        PageHeader::from_bytes(self.bytes()).page_id
    }

    pub fn next_page(&self) -> PageId {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes()[OFFSET_NEXT_PAGE..OFFSET_NEXT_PAGE + 4]);
        PageId::from_le_bytes(raw)
    }

    /// Number of live records.
    pub fn record_count(&self) -> u16 {
        self.read_u16(OFFSET_RECORD_COUNT)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Number of directory entries, live or free.
    pub fn slot_count(&self) -> u16 {
        self.read_u16(OFFSET_SLOT_COUNT)
    }

    fn free_end(&self) -> usize {
        self.read_u16(OFFSET_FREE_END) as usize
    }

    fn slot(&self, slot: SlotId) -> (u16, u16) {
        let at = SLOT_DIR_START + slot as usize * SLOT_SIZE;
        (self.read_u16(at), self.read_u16(at + 2))
    }

    fn is_live(&self, slot: SlotId) -> bool {
        self.slot(slot).0 != FREE_SLOT
    }

    fn first_free_slot(&self) -> Option<SlotId> {
        (0..self.slot_count()).find(|&slot| !self.is_live(slot))
    }

    fn live_bytes(&self) -> usize {
        (0..self.slot_count())
            .map(|slot| self.slot(slot))
            .filter(|&(offset, _)| offset != FREE_SLOT)
            .map(|(_, len)| len as usize)
            .sum()
    }

    fn contiguous_free(&self) -> usize {
        let dir_end = SLOT_DIR_START + self.slot_count() as usize * SLOT_SIZE;
        self.free_end().saturating_sub(dir_end)
    }

    /// Largest record that an insert could place on this page right now,
    /// counting space a compaction would recover.
    pub fn free_space(&self) -> usize {
        let dir_end = SLOT_DIR_START + self.slot_count() as usize * SLOT_SIZE;
        let new_slot = if self.first_free_slot().is_some() {
            0
        } else {
            SLOT_SIZE
        };
        PAGE_SIZE
            .saturating_sub(dir_end)
            .saturating_sub(self.live_bytes())
            .saturating_sub(new_slot)
    }

    fn check_slot(&self, slot: SlotId) -> Result<(usize, usize)> {
        if slot >= self.slot_count() {
            return Err(Error::InvalidSlotNumber(slot));
        }
        let (offset, len) = self.slot(slot);
        if offset == FREE_SLOT {
            return Err(Error::RecordNotFound(Rid::new(self.page_id(), slot)));
        }
        Ok((offset as usize, len as usize))
    }

    /// Bytes of the record in `slot`.
    ///
    /// # Errors
    /// - `InvalidSlotNumber` if `slot` is outside the directory
    /// - `RecordNotFound` if the slot was deleted
    pub fn record(&self, slot: SlotId) -> Result<&[u8]> {
        let (offset, len) = self.check_slot(slot)?;
        Ok(&self.bytes()[offset..offset + len])
    }

    /// First live slot, or `PageEmpty`.
    pub fn first_record(&self) -> Result<SlotId> {
        if self.is_empty() {
            return Err(Error::PageEmpty);
        }
        (0..self.slot_count())
            .find(|&slot| self.is_live(slot))
            .ok_or(Error::PageEmpty)
    }

    /// Next live slot after `slot`, or `LastRecordOnPage`.
    pub fn next_record(&self, slot: SlotId) -> Result<SlotId> {
        (slot.saturating_add(1)..self.slot_count())
            .find(|&next| self.is_live(next))
            .ok_or(Error::LastRecordOnPage)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeapPage<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn set_slot(&mut self, slot: SlotId, offset: u16, len: u16) {
        let at = SLOT_DIR_START + slot as usize * SLOT_SIZE;
        self.write_u16(at, offset);
        self.write_u16(at + 2, len);
    }

    fn set_free_end(&mut self, free_end: usize) {
        self.write_u16(OFFSET_FREE_END, free_end as u16);
    }

    /// Format the page as an empty heap page at `page_id`.
    pub fn init(&mut self, page_type: PageType, page_id: PageId) {
        self.bytes_mut().fill(0);
        PageHeader::new(page_type, page_id).write_to(self.bytes_mut());
        self.set_next_page(PageId::INVALID);
        self.set_free_end(PAGE_SIZE);
    }

    pub fn set_next_page(&mut self, next: PageId) {
        self.bytes_mut()[OFFSET_NEXT_PAGE..OFFSET_NEXT_PAGE + 4]
            .copy_from_slice(&next.to_le_bytes());
    }

    /// Store a record and return its slot.
    ///
    /// # Errors
    /// `NoSpaceOnPage` if the record does not fit even after compaction.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<SlotId> {
        let len = record.len();
        if len > MAX_RECORD_SIZE || len > self.free_space() {
            return Err(Error::NoSpaceOnPage);
        }

        let reused = self.first_free_slot();
        let dir_growth = if reused.is_some() { 0 } else { SLOT_SIZE };
        if self.contiguous_free() < len + dir_growth {
            self.compact();
        }

        let slot = match reused {
            Some(slot) => slot,
            None => {
                let slot = self.slot_count();
                self.write_u16(OFFSET_SLOT_COUNT, slot + 1);
                slot
            }
        };

        let offset = self.free_end() - len;
        self.bytes_mut()[offset..offset + len].copy_from_slice(record);
        self.set_free_end(offset);
        self.set_slot(slot, offset as u16, len as u16);

        let count = self.record_count();
        self.write_u16(OFFSET_RECORD_COUNT, count + 1);
        Ok(slot)
    }

    /// Mutable bytes of the record in `slot`, for same-length overwrites.
    pub fn record_mut(&mut self, slot: SlotId) -> Result<&mut [u8]> {
        let (offset, len) = self.check_slot(slot)?;
        Ok(&mut self.bytes_mut()[offset..offset + len])
    }

    /// Free the record in `slot`. Its directory entry stays for reuse.
    pub fn delete_record(&mut self, slot: SlotId) -> Result<()> {
        self.check_slot(slot)?;
        self.set_slot(slot, FREE_SLOT, 0);

        let count = self.record_count() - 1;
        self.write_u16(OFFSET_RECORD_COUNT, count);
        if count == 0 {
            self.write_u16(OFFSET_SLOT_COUNT, 0);
            self.set_free_end(PAGE_SIZE);
        }
        Ok(())
    }

    /// Pack live records against the end of the page.
    fn compact(&mut self) {
        let live: Vec<(SlotId, Vec<u8>)> = (0..self.slot_count())
            .filter(|&slot| self.is_live(slot))
            .map(|slot| {
                let (offset, len) = self.slot(slot);
                let (offset, len) = (offset as usize, len as usize);
                (slot, self.bytes()[offset..offset + len].to_vec())
            })
            .collect();

        let mut end = PAGE_SIZE;
        for (slot, record) in live {
            end -= record.len();
            self.bytes_mut()[end..end + record.len()].copy_from_slice(&record);
            self.set_slot(slot, end as u16, record.len() as u16);
        }
        self.set_free_end(end);
    }
}
