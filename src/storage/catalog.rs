//! File catalog - maps heap file names to their first page.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crate::common::{Error, PageId, Result};

/// Longest name the on-disk format can hold, in bytes.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Name → first page id registry for ordinary heap files.
///
/// Temporary heap files never appear here.
///
/// # On-disk format
/// ```text
/// u32            entry count
/// repeated:
///   u16          name length
///   [u8]         name (UTF-8)
///   u32          first page id
/// u32            CRC32 of everything above
/// ```
/// All integers are little-endian.
#[derive(Default)]
pub struct FileCatalog {
    entries: Mutex<HashMap<String, PageId>>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// First page of the file registered as `name`.
    pub fn lookup(&self, name: &str) -> Option<PageId> {
        self.entries.lock().get(name).copied()
    }

    /// Register a new file.
    ///
    /// # Errors
    /// - `FileExists` if `name` is already registered
    /// - `Configuration` if `name` is longer than [`MAX_NAME_LEN`] bytes
    pub fn register(&self, name: &str, first_page: PageId) -> Result<()> {
        if name.len() > MAX_NAME_LEN {
            return Err(Error::Configuration(format!(
                "file name of {} bytes exceeds the {} byte limit",
                name.len(),
                MAX_NAME_LEN
            )));
        }
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return Err(Error::FileExists(name.to_string()));
        }
        entries.insert(name.to_string(), first_page);
        Ok(())
    }

    /// Remove a file's entry.
    ///
    /// # Errors
    /// `FileNotFound` if `name` is not registered.
    pub fn unregister(&self, name: &str) -> Result<()> {
        self.entries
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the catalog to `path`, replacing any previous contents.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut entries: Vec<(String, PageId)> = self
            .entries
            .lock()
            .iter()
            .map(|(name, &pid)| (name.clone(), pid))
            .collect();
        entries.sort();

        let count = u32::try_from(entries.len())
            .map_err(|_| Error::CatalogCorrupted("too many entries".into()))?;
        let mut buf = Vec::new();
        buf.extend_from_slice(&count.to_le_bytes());
        for (name, pid) in &entries {
            let name_len = u16::try_from(name.len()).map_err(|_| {
                Error::CatalogCorrupted(format!("name too long: {} bytes", name.len()))
            })?;
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(&pid.to_le_bytes());
        }
        let checksum = crc32fast::hash(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());

        fs::write(path, buf)?;
        Ok(())
    }

    /// Read a catalog written by [`FileCatalog::save`].
    ///
    /// # Errors
    /// `CatalogCorrupted` on a checksum mismatch or truncated entry.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = fs::read(path)?;
        if buf.len() < 8 {
            return Err(Error::CatalogCorrupted("file too short".into()));
        }

        let (body, trailer) = buf.split_at(buf.len() - 4);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if crc32fast::hash(body) != stored {
            return Err(Error::CatalogCorrupted("checksum mismatch".into()));
        }

        let mut reader = CatalogReader { body, pos: 0 };
        let count = reader.u32()?;
        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = reader.u16()? as usize;
            let name = String::from_utf8(reader.take(name_len)?.to_vec())
                .map_err(|_| Error::CatalogCorrupted("name is not UTF-8".into()))?;
            let first_page = PageId::new(reader.u32()?);
            entries.insert(name, first_page);
        }

        Ok(Self {
            entries: Mutex::new(entries),
        })
    }
}

struct CatalogReader<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> CatalogReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.body.len() {
            return Err(Error::CatalogCorrupted("truncated entry".into()));
        }
        let bytes = &self.body[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_register_lookup_unregister() {
        let catalog = FileCatalog::new();
        assert!(catalog.is_empty());

        catalog.register("emp", PageId::new(4)).unwrap();
        assert_eq!(catalog.lookup("emp"), Some(PageId::new(4)));
        assert_eq!(catalog.lookup("dept"), None);

        catalog.unregister("emp").unwrap();
        assert_eq!(catalog.lookup("emp"), None);
    }

    #[test]
    fn test_duplicate_register_fails() {
        let catalog = FileCatalog::new();
        catalog.register("emp", PageId::new(4)).unwrap();

        assert!(matches!(
            catalog.register("emp", PageId::new(9)),
            Err(Error::FileExists(_))
        ));
        assert_eq!(catalog.lookup("emp"), Some(PageId::new(4)));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let catalog = FileCatalog::new();
        let longest = "n".repeat(MAX_NAME_LEN);
        catalog.register(&longest, PageId::new(2)).unwrap();

        assert!(matches!(
            catalog.register(&"n".repeat(MAX_NAME_LEN + 1), PageId::new(3)),
            Err(Error::Configuration(_))
        ));
        assert_eq!(catalog.len(), 1);

        let dir = tempdir().unwrap();
        let path = dir.path().join("db.catalog");
        catalog.save(&path).unwrap();
        let loaded = FileCatalog::load(&path).unwrap();
        assert_eq!(loaded.lookup(&longest), Some(PageId::new(2)));
    }

    #[test]
    fn test_unregister_missing_fails() {
        let catalog = FileCatalog::new();
        assert!(matches!(
            catalog.unregister("ghost"),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.catalog");

        let catalog = FileCatalog::new();
        catalog.register("emp", PageId::new(0)).unwrap();
        catalog.register("emp.sort.temp.1.0", PageId::new(17)).unwrap();
        catalog.save(&path).unwrap();

        let loaded = FileCatalog::load(&path).unwrap();
        assert_eq!(loaded.names(), vec!["emp", "emp.sort.temp.1.0"]);
        assert_eq!(loaded.lookup("emp.sort.temp.1.0"), Some(PageId::new(17)));
    }

    #[test]
    fn test_load_detects_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.catalog");

        let catalog = FileCatalog::new();
        catalog.register("emp", PageId::new(3)).unwrap();
        catalog.save(&path).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[6] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            FileCatalog::load(&path),
            Err(Error::CatalogCorrupted(_))
        ));
    }
}
