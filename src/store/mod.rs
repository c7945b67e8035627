//! Local durable storage.
//!
//! This module provides the partitioned key-value store that owns every
//! persisted byte in the system: submission records, cached form schemas,
//! draft autosaves and the anonymous identity. Values are stored as JSON
//! and synced to disk on every write.

mod error;
mod local;

pub use error::StoreError;
pub use local::{LocalStore, Partition};
