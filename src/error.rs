//! Error types for needlestore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using NeedleError
pub type Result<T> = std::result::Result<T, NeedleError>;

/// Unified error type for needlestore operations
#[derive(Debug, Error)]
pub enum NeedleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Underlying read/write/flush failure, including short reads
    /// (`ErrorKind::UnexpectedEof`).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("No such key: {0}")]
    KeyNotFound(u64),

    #[error("Volume index {index} out of range (store has {count} volumes)")]
    VolumeOutOfRange { index: usize, count: usize },

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("No enough room: needle needs {needed} bytes, volume has {available} left")]
    NoRoom { needed: u64, available: u64 },

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Format error: {0}")]
    Format(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch for key {key}: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { key: u64, stored: u32, computed: u32 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NeedleError {
    /// True when the error is a short read against a file or source.
    pub fn is_short_read(&self) -> bool {
        matches!(self, NeedleError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
