//! Heap files - unordered record storage on chains of slotted pages.
//!
//! - [`HeapFile`] - create, open and delete files; insert, get, update and
//!   delete records
//! - [`HeapScan`] - sequential cursor over a file's records

mod heap_file;
mod scan;

pub use heap_file::HeapFile;
pub use scan::HeapScan;
