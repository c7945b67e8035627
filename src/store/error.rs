//! Error types for the local store module.

use thiserror::Error;

/// Errors that can occur during local store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying storage engine is inaccessible (missing permissions,
    /// exhausted quota, corrupted environment). Fatal to all durability
    /// features; callers may continue in a degraded, non-persistent mode.
    #[error("Local storage unavailable: {0}")]
    Unavailable(#[from] fjall::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record under key '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    #[error("Store version mismatch: on-disk version {stored} is newer than supported version {current}")]
    VersionMismatch { stored: u32, current: u32 },

    #[error("Invalid store metadata: {0}")]
    InvalidMetadata(String),
}
