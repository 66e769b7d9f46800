//! Page types and layout.
//!
//! - [`Page`] - the raw 4KB container
//! - [`PageHeader`] / [`PageType`] - metadata at the start of every page
//! - [`HeapPage`] - slotted view used by heap file pages

mod heap_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use heap_page::{HeapPage, MAX_RECORD_SIZE, SLOT_DIR_START, SLOT_SIZE};
pub use page::Page;
pub use page_header::{PageHeader, PageType};
