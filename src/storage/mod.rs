//! Storage layer - disk I/O, page formats and the file catalog.
//!
//! - [`DiskManager`] - page-granular file I/O and page allocation
//! - [`page`] - page header, raw page and the heap page format
//! - [`FileCatalog`] - heap file name to first page id

mod catalog;
mod disk_manager;
pub mod page;

pub use catalog::{FileCatalog, MAX_NAME_LEN};
pub use disk_manager::DiskManager;
