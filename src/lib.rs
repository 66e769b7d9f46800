//! extsortdb - paged heap files with a bounded-memory external merge sort.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           extsortdb                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Sort Layer (sort/)                       │   │
//! │  │   SortJob → run generation → k-way merge passes          │   │
//! │  │        RecordComparator on one key field                 │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Heap Layer (heap/)                       │   │
//! │  │     HeapFile (header page → data pages) + HeapScan       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │        Database (database.rs) + FileCatalog              │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + LRU replacer + guards      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │     DiskManager + Page + PageHeader + HeapPage           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Rid, Error, config)
//! - [`storage`] - Disk I/O, page formats and the file catalog
//! - [`buffer`] - Buffer pool management
//! - [`heap`] - Heap files and scans
//! - [`sort`] - External sort
//!
//! # Quick Start
//! ```no_run
//! use extsortdb::sort::{ExternalSort, Field, Schema, SortJob};
//! use extsortdb::{Database, DatabaseConfig, HeapFile};
//!
//! let db = Database::open_or_create("numbers.db", DatabaseConfig::default())?;
//!
//! let input = HeapFile::create_or_open(&db, Some("numbers"))?;
//! for n in [5i32, 3, 1, 4, 2] {
//!     input.insert(&n.to_le_bytes())?;
//! }
//!
//! let schema = Schema::new(vec![Field::integer()])?;
//! let job = SortJob::new("numbers", "numbers_sorted", schema, 0).buffer_pages(3);
//! let summary = ExternalSort::new(&db, job)?.run()?;
//! assert_eq!(summary.records, 5);
//! # Ok::<(), extsortdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
mod database;
pub mod heap;
pub mod sort;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DatabaseConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, Result, Rid, SlotId};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use database::Database;
pub use heap::{HeapFile, HeapScan};
pub use storage::page::{HeapPage, Page, PageHeader, PageType};
pub use storage::{DiskManager, FileCatalog};
