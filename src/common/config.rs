//! Configuration for extsortdb.
//!
//! Compile-time layout constants live here next to [`DatabaseConfig`], the
//! runtime knobs handed to [`Database`](crate::Database) when a database file
//! is created or opened.

/// Size of a page in bytes (4KB).
///
/// Every heap page, header page and catalog-addressed page uses this size.
/// Offsets inside a page fit in a `u16`, which the slot directory relies on.
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
///
/// `u32::MAX` itself is reserved for [`PageId::INVALID`](crate::PageId::INVALID).
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Maximum theoretical database size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Frames in the buffer pool when nothing else is configured.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest pool a heap file can work with.
///
/// Appending a page to the tail of a chain pins the old tail and the new page
/// at the same time; a scan pins a third one.
pub const MIN_POOL_SIZE: usize = 3;

/// Fewest buffer pages a sort job may be given: two merge inputs plus the
/// output.
pub const MIN_SORT_BUFFER_PAGES: usize = 3;

/// Buffer pages for a sort job that does not set its own budget.
pub const DEFAULT_SORT_BUFFER_PAGES: usize = 16;

/// Runtime settings for a database.
///
/// # Example
/// ```
/// use extsortdb::DatabaseConfig;
///
/// let config = DatabaseConfig::default().pool_size(16).sync_writes(false);
/// assert_eq!(config.pool_size, 16);
/// assert!(!config.sync_writes);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// `fsync` after every page write and allocation.
    pub sync_writes: bool,
}

impl DatabaseConfig {
    /// Set the buffer pool size (clamped to [`MIN_POOL_SIZE`]).
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(MIN_POOL_SIZE);
        self
    }

    /// Enable or disable `fsync` on writes.
    pub fn sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            sync_writes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert!(PAGE_SIZE <= u16::MAX as usize);
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.sync_writes);
    }

    #[test]
    fn test_pool_size_is_clamped() {
        let config = DatabaseConfig::default().pool_size(1);
        assert_eq!(config.pool_size, MIN_POOL_SIZE);
    }
}
