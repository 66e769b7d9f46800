//! Heap file - an unordered collection of records on a chain of pages.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::common::{Error, PageId, Result, ResultExt, Rid};
use crate::database::Database;
use crate::storage::page::{PageType, MAX_RECORD_SIZE};

use super::scan::HeapScan;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A named (or temporary) heap file.
///
/// # Layout
/// ```text
/// catalog: name ──▶ ┌────────────┐    ┌──────────┐    ┌──────────┐
///                   │ HeapHeader │───▶│ HeapData │───▶│ HeapData │───▶ INVALID
///                   │ 0 records  │    │ records  │    │ records  │
///                   └────────────┘    └──────────┘    └──────────┘
/// ```
///
/// The header page never holds records. It exists so the chain is never
/// empty: a file whose data pages were all freed still has a page to hang
/// the next insert off.
///
/// Every operation pins pages through buffer pool guards and releases them
/// before returning, including on error paths.
///
/// # Example
/// ```no_run
/// use extsortdb::{Database, DatabaseConfig, HeapFile};
///
/// let db = Database::open_or_create("demo.db", DatabaseConfig::default())?;
/// let file = HeapFile::create_or_open(&db, Some("demo"))?;
///
/// let rid = file.insert(b"hello")?;
/// assert_eq!(file.get(rid)?, Some(b"hello".to_vec()));
/// file.delete(rid)?;
/// # Ok::<(), extsortdb::Error>(())
/// ```
pub struct HeapFile<'db> {
    db: &'db Database,
    name: String,
    first_page_id: PageId,
    temporary: bool,
    deleted: bool,
    /// Data pages this handle freed, with the page that followed each one.
    released: Mutex<Vec<(PageId, PageId)>>,
}

impl<'db> HeapFile<'db> {
    /// Open the file registered as `name`, creating it if it does not exist.
    /// `None` creates a temporary file that is deleted when dropped.
    pub fn create_or_open(db: &'db Database, name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => match db.catalog().lookup(name) {
                Some(first_page_id) => Ok(Self::attach(db, name, first_page_id)),
                None => Self::build(db, name.to_string(), false),
            },
            None => Self::temporary(db),
        }
    }

    /// Create a new ordinary file.
    ///
    /// # Errors
    /// `FileExists` if `name` is already registered.
    pub fn create(db: &'db Database, name: &str) -> Result<Self> {
        if db.catalog().lookup(name).is_some() {
            return Err(Error::FileExists(name.to_string()));
        }
        Self::build(db, name.to_string(), false)
    }

    /// Open an existing ordinary file.
    ///
    /// # Errors
    /// `FileNotFound` if `name` is not registered.
    pub fn open(db: &'db Database, name: &str) -> Result<Self> {
        let first_page_id = db
            .catalog()
            .lookup(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;
        Ok(Self::attach(db, name, first_page_id))
    }

    /// Create an unregistered file with a generated name.
    pub fn temporary(db: &'db Database) -> Result<Self> {
        let n = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("__temp_heap.{}.{}", std::process::id(), n);
        Self::build(db, name, true)
    }

    fn attach(db: &'db Database, name: &str, first_page_id: PageId) -> Self {
        debug!("opened heap file '{}' at {}", name, first_page_id);
        Self {
            db,
            name: name.to_string(),
            first_page_id,
            temporary: false,
            deleted: false,
            released: Mutex::new(Vec::new()),
        }
    }

    /// Allocate header + one data page and, for ordinary files, register.
    fn build(db: &'db Database, name: String, temporary: bool) -> Result<Self> {
        let bpm = db.buffer_pool();

        let mut header = bpm.new_page().chain("heap file create")?;
        let header_id = header.page_id();
        header.heap_page_mut().init(PageType::HeapHeader, header_id);

        let data_id = match bpm.new_page() {
            Ok(mut data) => {
                let data_id = data.page_id();
                data.heap_page_mut().init(PageType::HeapData, data_id);
                data_id
            }
            Err(e) => {
                drop(header);
                Self::release_pages(db, &[header_id]);
                return Err(e).chain("heap file create");
            }
        };
        header.heap_page_mut().set_next_page(data_id);
        drop(header);

        if !temporary {
            if let Err(e) = db.catalog().register(&name, header_id) {
                Self::release_pages(db, &[header_id, data_id]);
                return Err(e);
            }
        }

        debug!(
            "created heap file '{}' at {} (temporary: {})",
            name, header_id, temporary
        );
        Ok(Self {
            db,
            name,
            first_page_id: header_id,
            temporary,
            deleted: false,
            released: Mutex::new(Vec::new()),
        })
    }

    /// Best-effort cleanup after a failed create.
    fn release_pages(db: &Database, pages: &[PageId]) {
        for &pid in pages {
            if let Err(e) = db.buffer_pool().free_page(pid) {
                warn!("could not release {} after failed create: {}", pid, e);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The header page, which is what the catalog maps the name to.
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub(crate) fn database(&self) -> &'db Database {
        self.db
    }

    /// Pages in the chain, header included.
    pub fn page_count(&self) -> Result<usize> {
        Ok(self.page_ids()?.len())
    }

    /// Every page id in chain order, starting with the header.
    pub(crate) fn page_ids(&self) -> Result<Vec<PageId>> {
        self.check_live()?;
        let bpm = self.db.buffer_pool();

        let mut pages = Vec::new();
        let mut current = self.first_page_id;
        while current.is_valid() {
            pages.push(current);
            let guard = bpm.fetch_page_read(current).chain("heap file walk")?;
            current = guard.heap_page().next_page();
        }
        Ok(pages)
    }

    /// Number of data pages this handle has released so far.
    pub(super) fn release_count(&self) -> usize {
        self.released.lock().len()
    }

    /// Replay the releases after the first `seen` against a cursor parked on
    /// `page`. Returns the page the cursor moved to, if its page was released,
    /// and updates `seen`.
    pub(super) fn follow_releases(&self, seen: &mut usize, page: PageId) -> Option<PageId> {
        let released = self.released.lock();
        let mut current = page;
        let mut moved = None;
        for &(freed, next) in released.iter().skip(*seen) {
            if freed == current {
                current = next;
                moved = Some(next);
            }
        }
        *seen = released.len();
        moved
    }

    pub(super) fn check_live(&self) -> Result<()> {
        if self.deleted {
            return Err(Error::AlreadyDeleted(self.name.clone()));
        }
        Ok(())
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Number of live records in the file.
    pub fn record_count(&self) -> Result<usize> {
        self.check_live()?;
        let bpm = self.db.buffer_pool();

        let mut count = 0usize;
        let mut current = self.first_page_id;
        while current.is_valid() {
            let guard = bpm
                .fetch_page_read(current)
                .chain("heap file record count")?;
            let page = guard.heap_page();
            count += page.record_count() as usize;
            current = page.next_page();
        }
        Ok(count)
    }

    /// Store a record on the first data page with room, appending a new page
    /// to the chain when none has any.
    ///
    /// # Errors
    /// - `BadRecordPointer` for an empty record
    /// - `NoSpaceOnPage` if the record is larger than a page can hold
    pub fn insert(&self, record: &[u8]) -> Result<Rid> {
        self.check_live()?;
        if record.is_empty() {
            return Err(Error::BadRecordPointer {
                expected: 1,
                actual: 0,
            });
        }
        if record.len() > MAX_RECORD_SIZE {
            return Err(Error::NoSpaceOnPage);
        }

        let bpm = self.db.buffer_pool();
        let mut last = self.first_page_id;
        let mut current = bpm
            .fetch_page_read(last)
            .chain("heap file insert")?
            .heap_page()
            .next_page();

        while current.is_valid() {
            let mut guard = bpm.fetch_page_write(current).chain("heap file insert")?;
            if guard.heap_page().free_space() >= record.len() {
                let slot = guard.heap_page_mut().insert_record(record)?;
                return Ok(Rid::new(current, slot));
            }
            last = current;
            current = guard.heap_page().next_page();
        }

        self.append_page(last, record)
    }

    /// Link a fresh data page after `tail` and put `record` on it.
    fn append_page(&self, tail: PageId, record: &[u8]) -> Result<Rid> {
        let bpm = self.db.buffer_pool();

        let (page_id, slot) = {
            let mut guard = bpm.new_page().chain("heap file insert")?;
            let page_id = guard.page_id();
            let mut page = guard.heap_page_mut();
            page.init(PageType::HeapData, page_id);
            (page_id, page.insert_record(record)?)
        };

        match bpm.fetch_page_write(tail) {
            Ok(mut guard) => {
                guard.heap_page_mut().set_next_page(page_id);
            }
            Err(e) => {
                Self::release_pages(self.db, &[page_id]);
                return Err(e).chain("heap file insert");
            }
        }

        trace!("heap file '{}' grew by {}", self.name, page_id);
        Ok(Rid::new(page_id, slot))
    }

    /// Copy out the record at `rid`.
    ///
    /// Returns `Ok(None)` when `rid`'s page is not in this file or the slot
    /// has been deleted.
    ///
    /// # Errors
    /// - `BadRecordId` if `rid` names the header page or no page at all
    /// - `InvalidSlotNumber` if the slot is outside the page's directory
    pub fn get(&self, rid: Rid) -> Result<Option<Vec<u8>>> {
        self.check_rid(rid)?;
        let bpm = self.db.buffer_pool();

        let mut current = self.first_page_id;
        while current.is_valid() {
            let guard = bpm.fetch_page_read(current).chain("heap file get")?;
            let page = guard.heap_page();
            if current == rid.page_id {
                return match page.record(rid.slot) {
                    Ok(bytes) => Ok(Some(bytes.to_vec())),
                    Err(Error::RecordNotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                };
            }
            current = page.next_page();
        }
        Ok(None)
    }

    /// Remove the record at `rid`. A data page left empty is unlinked from
    /// the chain and freed.
    ///
    /// # Errors
    /// `RecordNotFound` if `rid`'s page is not in this file or the slot is
    /// already free.
    pub fn delete(&self, rid: Rid) -> Result<()> {
        self.check_rid(rid)?;
        let bpm = self.db.buffer_pool();

        let prev = self
            .predecessor_of(rid.page_id)?
            .ok_or(Error::RecordNotFound(rid))?;

        let (emptied, next) = {
            let mut guard = bpm
                .fetch_page_write(rid.page_id)
                .chain("heap file delete")?;
            // Check first so a miss does not dirty the page.
            match guard.heap_page().record(rid.slot) {
                Ok(_) => {}
                Err(Error::RecordNotFound(_)) => return Err(Error::RecordNotFound(rid)),
                Err(e) => return Err(e),
            }
            let mut page = guard.heap_page_mut();
            page.delete_record(rid.slot)?;
            (page.is_empty(), page.next_page())
        };

        if emptied {
            bpm.fetch_page_write(prev)
                .chain("heap file delete")?
                .heap_page_mut()
                .set_next_page(next);
            bpm.free_page(rid.page_id).chain("heap file delete")?;
            self.released.lock().push((rid.page_id, next));
            trace!("heap file '{}' released {}", self.name, rid.page_id);
        }
        Ok(())
    }

    /// Overwrite the record at `rid` with a value of the same length.
    ///
    /// # Errors
    /// - `InvalidUpdate` if the lengths differ; the record is left as it was
    /// - `RecordNotFound` if there is no record at `rid`
    pub fn update(&self, rid: Rid, record: &[u8]) -> Result<()> {
        self.check_rid(rid)?;
        if self.predecessor_of(rid.page_id)?.is_none() {
            return Err(Error::RecordNotFound(rid));
        }

        let mut guard = self
            .db
            .buffer_pool()
            .fetch_page_write(rid.page_id)
            .chain("heap file update")?;

        let stored = match guard.heap_page().record(rid.slot) {
            Ok(bytes) => bytes.len(),
            Err(Error::RecordNotFound(_)) => return Err(Error::RecordNotFound(rid)),
            Err(e) => return Err(e),
        };
        if stored != record.len() {
            return Err(Error::InvalidUpdate {
                expected: stored,
                actual: record.len(),
            });
        }

        guard
            .heap_page_mut()
            .record_mut(rid.slot)?
            .copy_from_slice(record);
        Ok(())
    }

    /// Start a scan at the beginning of the file.
    pub fn open_scan(&self) -> HeapScan<'_, 'db> {
        HeapScan::new(self)
    }

    /// Free every page of the file and drop its catalog entry.
    ///
    /// # Errors
    /// `AlreadyDeleted` if this handle already deleted the file.
    pub fn delete_file(&mut self) -> Result<()> {
        let pages = self.page_ids()?;
        let bpm = self.db.buffer_pool();

        for &pid in &pages {
            bpm.free_page(pid).chain("heap file delete_file")?;
        }
        if !self.temporary {
            self.db
                .catalog()
                .unregister(&self.name)
                .chain("heap file delete_file")?;
        }

        self.deleted = true;
        debug!(
            "deleted heap file '{}' ({} pages)",
            self.name,
            pages.len()
        );
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_rid(&self, rid: Rid) -> Result<()> {
        self.check_live()?;
        if !rid.page_id.is_valid() || rid.page_id == self.first_page_id {
            return Err(Error::BadRecordId(rid));
        }
        Ok(())
    }

    /// Page before `target` in the chain, `None` if `target` is not in it.
    fn predecessor_of(&self, target: PageId) -> Result<Option<PageId>> {
        let bpm = self.db.buffer_pool();

        let mut prev = self.first_page_id;
        loop {
            let next = bpm
                .fetch_page_read(prev)
                .chain("heap file walk")?
                .heap_page()
                .next_page();
            if !next.is_valid() {
                return Ok(None);
            }
            if next == target {
                return Ok(Some(prev));
            }
            prev = next;
        }
    }
}

impl Drop for HeapFile<'_> {
    fn drop(&mut self) {
        if self.temporary && !self.deleted {
            if let Err(e) = self.delete_file() {
                warn!("could not delete temporary heap file '{}': {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::DatabaseConfig;
    use tempfile::tempdir;

    fn create_test_db(pool_size: usize) -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::default()
            .pool_size(pool_size)
            .sync_writes(false);
        let db = Database::create(dir.path().join("heap.db"), config).unwrap();
        (db, dir)
    }

    #[test]
    fn test_new_file_has_header_and_one_data_page() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create_or_open(&db, Some("t")).unwrap();

        assert_eq!(file.page_count().unwrap(), 2);
        assert_eq!(file.record_count().unwrap(), 0);
        assert_eq!(db.catalog().lookup("t"), Some(file.first_page_id()));
    }

    #[test]
    fn test_create_or_open_reopens_existing() {
        let (db, _dir) = create_test_db(8);
        let first = HeapFile::create_or_open(&db, Some("t")).unwrap();
        first.insert(b"abc").unwrap();
        let pages_before = db.buffer_pool().disk_page_count();

        let again = HeapFile::create_or_open(&db, Some("t")).unwrap();
        assert_eq!(again.first_page_id(), first.first_page_id());
        assert_eq!(again.record_count().unwrap(), 1);
        assert_eq!(db.buffer_pool().disk_page_count(), pages_before);
    }

    #[test]
    fn test_create_and_open_errors() {
        let (db, _dir) = create_test_db(8);
        assert!(matches!(
            HeapFile::open(&db, "missing"),
            Err(Error::FileNotFound(_))
        ));

        let _file = HeapFile::create(&db, "t").unwrap();
        assert!(matches!(
            HeapFile::create(&db, "t"),
            Err(Error::FileExists(_))
        ));
    }

    #[test]
    fn test_insert_get_update() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();

        let rid = file.insert(b"aaaa").unwrap();
        assert_eq!(file.get(rid).unwrap(), Some(b"aaaa".to_vec()));

        file.update(rid, b"bbbb").unwrap();
        assert_eq!(file.get(rid).unwrap(), Some(b"bbbb".to_vec()));

        assert!(matches!(
            file.update(rid, b"ccc"),
            Err(Error::InvalidUpdate {
                expected: 4,
                actual: 3
            })
        ));
        assert_eq!(file.get(rid).unwrap(), Some(b"bbbb".to_vec()));
    }

    #[test]
    fn test_insert_rejects_bad_lengths() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();
        let pages = db.buffer_pool().disk_page_count();

        assert!(matches!(
            file.insert(b""),
            Err(Error::BadRecordPointer { .. })
        ));
        assert!(matches!(
            file.insert(&vec![0u8; MAX_RECORD_SIZE + 1]),
            Err(Error::NoSpaceOnPage)
        ));
        assert_eq!(db.buffer_pool().disk_page_count(), pages);

        assert!(file.insert(&vec![7u8; MAX_RECORD_SIZE]).is_ok());
    }

    #[test]
    fn test_insert_grows_chain() {
        let (db, _dir) = create_test_db(4);
        let file = HeapFile::create(&db, "t").unwrap();

        let record = [1u8; 1000];
        for _ in 0..10 {
            file.insert(&record).unwrap();
        }

        // Four 1000-byte records per page.
        assert_eq!(file.page_count().unwrap(), 1 + 3);
        assert_eq!(file.record_count().unwrap(), 10);
        assert_eq!(db.buffer_pool().pinned_frame_count(), 0);
    }

    #[test]
    fn test_rid_validation() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();
        let rid = file.insert(b"x").unwrap();

        let header = Rid::new(file.first_page_id(), 0);
        assert!(matches!(file.get(header), Err(Error::BadRecordId(_))));
        assert!(matches!(
            file.delete(Rid::new(PageId::INVALID, 0)),
            Err(Error::BadRecordId(_))
        ));
        assert!(matches!(
            file.get(Rid::new(rid.page_id, 9)),
            Err(Error::InvalidSlotNumber(9))
        ));
        assert_eq!(file.get(Rid::new(PageId::new(999), 0)).unwrap(), None);
    }

    #[test]
    fn test_delete_then_get_is_none() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();
        let keep = file.insert(b"keep").unwrap();
        let gone = file.insert(b"gone").unwrap();

        file.delete(gone).unwrap();
        assert_eq!(file.get(gone).unwrap(), None);
        assert_eq!(file.get(keep).unwrap(), Some(b"keep".to_vec()));
        assert!(matches!(file.delete(gone), Err(Error::RecordNotFound(_))));
        assert!(matches!(
            file.update(gone, b"gone"),
            Err(Error::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_delete_only_record_frees_page() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();
        let rid = file.insert(b"only").unwrap();

        file.delete(rid).unwrap();
        assert_eq!(file.page_count().unwrap(), 1);
        assert_eq!(db.buffer_pool().disk_free_page_count(), 1);
        assert_eq!(file.get(rid).unwrap(), None);

        let again = file.insert(b"back").unwrap();
        assert_eq!(file.page_count().unwrap(), 2);
        assert_eq!(file.get(again).unwrap(), Some(b"back".to_vec()));
    }

    #[test]
    fn test_delete_middle_page_splices_chain() {
        let (db, _dir) = create_test_db(8);
        let file = HeapFile::create(&db, "t").unwrap();
        let record = [9u8; 2000];
        let rids: Vec<Rid> = (0..6).map(|_| file.insert(&record).unwrap()).collect();
        assert_eq!(file.page_count().unwrap(), 4);

        let middle = rids[2].page_id;
        for rid in rids.iter().filter(|r| r.page_id == middle) {
            file.delete(*rid).unwrap();
        }

        let pages = file.page_ids().unwrap();
        assert_eq!(pages.len(), 3);
        assert!(!pages.contains(&middle));
        assert_eq!(file.record_count().unwrap(), 4);
    }

    #[test]
    fn test_delete_file() {
        let (db, _dir) = create_test_db(8);
        let mut file = HeapFile::create(&db, "t").unwrap();
        file.insert(b"x").unwrap();

        file.delete_file().unwrap();
        assert_eq!(db.catalog().lookup("t"), None);
        assert_eq!(db.buffer_pool().disk_free_page_count(), 2);
        assert!(matches!(file.delete_file(), Err(Error::AlreadyDeleted(_))));
        assert!(matches!(file.insert(b"y"), Err(Error::AlreadyDeleted(_))));
    }

    #[test]
    fn test_temporary_file_removed_on_drop() {
        let (db, _dir) = create_test_db(8);
        {
            let temp = HeapFile::create_or_open(&db, None).unwrap();
            assert!(temp.is_temporary());
            assert!(temp.name().starts_with("__temp_heap."));
            temp.insert(b"scratch").unwrap();
            assert!(db.catalog().is_empty());
        }
        assert_eq!(db.buffer_pool().disk_free_page_count(), 2);
    }

    #[test]
    fn test_temporary_names_are_unique() {
        let (db, _dir) = create_test_db(8);
        let a = HeapFile::temporary(&db).unwrap();
        let b = HeapFile::temporary(&db).unwrap();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn test_page_store_errors_are_chained() {
        let (db, _dir) = create_test_db(3);
        let file = HeapFile::create(&db, "t").unwrap();

        let _pins: Vec<_> = (0..3).map(|_| db.buffer_pool().new_page().unwrap()).collect();
        let err = file.record_count().unwrap_err();
        assert!(matches!(err, Error::Chained { .. }));
        assert!(matches!(err.root(), Error::NoFreeFrames));
    }
}
