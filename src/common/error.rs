//! Error types for extsortdb.

use super::Rid;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in extsortdb.
///
/// Variants fall into three groups:
/// - page store and catalog failures (`Io` through `CatalogCorrupted`), which
///   the heap layer wraps in [`Error::Chained`] with the operation that hit them
/// - heap file and page structure errors, passed through unchanged
/// - control signals ([`Error::EndOfFile`], [`Error::RecordNotFound`]) that a
///   caller is expected to handle rather than report
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from disk or catalog file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and every resident page is pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// The page id is out of range or names a page that was already freed.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Tried to free a page that is still pinned.
    #[error("Page {0} is still pinned")]
    PagePinned(u32),

    /// A page read back from disk failed its checksum or self-id check.
    #[error("Checksum mismatch on page {0}")]
    ChecksumMismatch(u32),

    /// The persisted catalog file is truncated or fails its checksum.
    #[error("Catalog file is corrupted: {0}")]
    CatalogCorrupted(String),

    /// The record id is structurally invalid (e.g. names the header page).
    #[error("Bad record id {0}")]
    BadRecordId(Rid),

    /// A record buffer has the wrong shape for the operation.
    #[error("Bad record pointer: expected {expected} bytes, got {actual}")]
    BadRecordPointer { expected: usize, actual: usize },

    /// A scan has no more records.
    #[error("End of file")]
    EndOfFile,

    /// No live record exists under this record id.
    #[error("Record {0} not found")]
    RecordNotFound(Rid),

    /// Update payload length differs from the stored record length.
    #[error("Invalid update: record is {expected} bytes, new value is {actual}")]
    InvalidUpdate { expected: usize, actual: usize },

    /// Not enough free space on the page for the record.
    #[error("No space on page for record")]
    NoSpaceOnPage,

    /// The page holds no records.
    #[error("Page is empty")]
    PageEmpty,

    /// There is no record after the given slot on this page.
    #[error("Last record on page")]
    LastRecordOnPage,

    /// Slot number is outside the page's slot directory.
    #[error("Invalid slot number {0}")]
    InvalidSlotNumber(u16),

    /// `delete_file` was called on a heap file that is already deleted.
    #[error("Heap file '{0}' has already been deleted")]
    AlreadyDeleted(String),

    /// No heap file is registered under this name.
    #[error("Heap file '{0}' not found")]
    FileNotFound(String),

    /// A heap file is already registered under this name.
    #[error("Heap file '{0}' already exists")]
    FileExists(String),

    /// The caller asked for something the engine cannot do.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A lower-layer failure, tagged with the operation that triggered it.
    #[error("{context}: {source}")]
    Chained {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error below any [`Error::Chained`] wrappers.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Chained { source, .. } = err {
            err = source;
        }
        err
    }

    /// True for expected, recoverable signals rather than failures.
    pub fn is_control_signal(&self) -> bool {
        matches!(self.root(), Error::EndOfFile | Error::RecordNotFound(_))
    }
}

/// Attach the triggering operation to a lower-layer error.
pub(crate) trait ResultExt<T> {
    fn chain(self, context: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn chain(self, context: &'static str) -> Result<T> {
        self.map_err(|source| Error::Chained {
            context,
            source: Box::new(source),
        })
    }
}
