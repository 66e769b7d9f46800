//! External sort of heap files under a fixed memory budget.
//!
//! - [`Schema`] / [`Field`] / [`AttrType`] - fixed-length record layout
//! - [`RecordComparator`] - ordering on one key field
//! - [`SortJob`] / [`ExternalSort`] - run generation and merge passes
//! - [`SortSummary`] - what a finished sort did

mod comparator;
mod external_sort;
mod merge;
mod schema;

pub use comparator::RecordComparator;
pub use external_sort::{run_file_name, ExternalSort, SortJob, SortSummary};
pub use schema::{AttrType, Field, Schema, SortOrder};
