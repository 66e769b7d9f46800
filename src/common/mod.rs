//! Common types shared across extsortdb.
//!
//! - Configuration constants and [`DatabaseConfig`](config::DatabaseConfig)
//! - The crate [`Error`] type
//! - Identifiers ([`PageId`], [`FrameId`], [`Rid`])

pub mod config;
pub mod error;
mod frame_id;
mod page_id;
mod rid;

pub use error::{Error, Result};
pub(crate) use error::ResultExt;
pub use frame_id::FrameId;
pub use page_id::PageId;
pub use rid::{Rid, SlotId};
