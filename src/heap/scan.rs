//! Sequential scan over a heap file.

use crate::common::{Error, PageId, Result, ResultExt, Rid, SlotId};

use super::heap_file::HeapFile;

/// Forward-only cursor over a heap file's records, in chain order and slot
/// order within a page.
///
/// A page is pinned only while [`get_next`](HeapScan::get_next) runs, so an
/// open scan holds no buffer frames between calls. Records may be deleted
/// through the same handle while a scan is open, including the one just
/// returned: when that empties the page, the scan carries on from the page
/// that followed it. Changes made through other handles may or may not be
/// observed.
///
/// # Example
/// ```no_run
/// # use extsortdb::{Database, DatabaseConfig, HeapFile};
/// # let db = Database::open_or_create("scan.db", DatabaseConfig::default())?;
/// let file = HeapFile::open(&db, "people")?;
/// for entry in file.open_scan() {
///     let (rid, bytes) = entry?;
///     println!("{} -> {} bytes", rid, bytes.len());
/// }
/// # Ok::<(), extsortdb::Error>(())
/// ```
pub struct HeapScan<'a, 'db> {
    file: &'a HeapFile<'db>,
    page_id: PageId,
    /// Slot returned last on `page_id`; `None` before the first record.
    last_slot: Option<SlotId>,
    /// Page releases of `file` already accounted for.
    seen_releases: usize,
    done: bool,
}

impl<'a, 'db> HeapScan<'a, 'db> {
    pub(super) fn new(file: &'a HeapFile<'db>) -> Self {
        Self {
            file,
            page_id: file.first_page_id(),
            last_slot: None,
            seen_releases: file.release_count(),
            done: false,
        }
    }

    /// Next record and its id.
    ///
    /// # Errors
    /// `EndOfFile` once the scan is exhausted, on this and every later call.
    /// Any other error is a real failure.
    pub fn get_next(&mut self) -> Result<(Rid, Vec<u8>)> {
        self.file.check_live()?;
        let bpm = self.file.database().buffer_pool();

        if !self.done {
            if let Some(next) = self
                .file
                .follow_releases(&mut self.seen_releases, self.page_id)
            {
                self.page_id = next;
                self.last_slot = None;
                self.done = !next.is_valid();
            }
        }

        loop {
            if self.done {
                return Err(Error::EndOfFile);
            }

            let guard = bpm.fetch_page_read(self.page_id).chain("heap scan")?;
            let page = guard.heap_page();

            let slot = match self.last_slot {
                None => page.first_record(),
                Some(slot) => page.next_record(slot),
            };

            match slot {
                Ok(slot) => {
                    self.last_slot = Some(slot);
                    let record = page.record(slot)?.to_vec();
                    return Ok((Rid::new(self.page_id, slot), record));
                }
                Err(Error::PageEmpty) | Err(Error::LastRecordOnPage) => {
                    let next = page.next_page();
                    if next.is_valid() {
                        self.page_id = next;
                        self.last_slot = None;
                    } else {
                        self.done = true;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Iterator for HeapScan<'_, '_> {
    type Item = Result<(Rid, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get_next() {
            Ok(entry) => Some(Ok(entry)),
            Err(Error::EndOfFile) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
