//! Database - one backing file, its buffer pool and its file catalog.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::buffer::BufferPoolManager;
use crate::common::config::DatabaseConfig;
use crate::common::Result;
use crate::storage::{DiskManager, FileCatalog};

/// Everything a heap file needs from its environment.
///
/// The catalog lives in a sidecar file next to the database file
/// (`<path>.catalog`) and is written by [`Database::flush`], which also runs
/// when the database is dropped.
///
/// # Example
/// ```no_run
/// use extsortdb::{Database, DatabaseConfig, HeapFile};
///
/// let db = Database::open_or_create("people.db", DatabaseConfig::default())?;
/// let people = HeapFile::create_or_open(&db, Some("people"))?;
/// people.insert(b"ada")?;
/// db.flush()?;
/// # Ok::<(), extsortdb::Error>(())
/// ```
pub struct Database {
    bpm: BufferPoolManager,
    catalog: FileCatalog,
    catalog_path: PathBuf,
}

impl Database {
    /// Create a new database file. Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        let mut dm = DiskManager::create(&path)?;
        dm.set_sync_writes(config.sync_writes);
        info!("created database {}", path.as_ref().display());

        Ok(Self::assemble(dm, FileCatalog::new(), &path, config))
    }

    /// Open an existing database file and load its catalog, if one was saved.
    pub fn open<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        let mut dm = DiskManager::open(&path)?;
        dm.set_sync_writes(config.sync_writes);

        let catalog_path = Self::catalog_path_for(path.as_ref());
        let catalog = if catalog_path.exists() {
            FileCatalog::load(&catalog_path)?
        } else {
            FileCatalog::new()
        };
        info!(
            "opened database {} ({} pages, {} files)",
            path.as_ref().display(),
            dm.page_count(),
            catalog.len()
        );

        Ok(Self::assemble(dm, catalog, &path, config))
    }

    pub fn open_or_create<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, config)
        } else {
            Self::create(path, config)
        }
    }

    fn assemble<P: AsRef<Path>>(
        dm: DiskManager,
        catalog: FileCatalog,
        path: P,
        config: DatabaseConfig,
    ) -> Self {
        Self {
            bpm: BufferPoolManager::new(config.pool_size, dm),
            catalog,
            catalog_path: Self::catalog_path_for(path.as_ref()),
        }
    }

    fn catalog_path_for(path: &Path) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(".catalog");
        PathBuf::from(os)
    }

    #[inline]
    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    #[inline]
    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Write every dirty page and the catalog to disk.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.catalog.save(&self.catalog_path)?;
        debug!(
            "flushed database ({} files, {})",
            self.catalog.len(),
            self.bpm.stats().snapshot()
        );
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("flush on close failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> DatabaseConfig {
        DatabaseConfig::default().pool_size(8).sync_writes(false)
    }

    #[test]
    fn test_catalog_path_is_sidecar() {
        let path = Path::new("/tmp/data/sort.db");
        assert_eq!(
            Database::catalog_path_for(path),
            PathBuf::from("/tmp/data/sort.db.catalog")
        );
    }

    #[test]
    fn test_create_rejects_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        drop(Database::create(&path, config()).unwrap());
        assert!(Database::create(&path, config()).is_err());
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let db = Database::create(&path, config()).unwrap();
            let pid = db.buffer_pool().new_page().unwrap().page_id();
            db.catalog().register("orders", pid).unwrap();
        }

        let db = Database::open(&path, config()).unwrap();
        assert_eq!(db.catalog().names(), vec!["orders".to_string()]);
        assert_eq!(db.buffer_pool().disk_page_count(), 1);
    }

    #[test]
    fn test_open_without_catalog_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, []).unwrap();

        let db = Database::open(&path, config()).unwrap();
        assert!(db.catalog().is_empty());
    }
}
