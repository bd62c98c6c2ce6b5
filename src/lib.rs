//! # needlestore
//!
//! A needle-based object store for many small immutable blobs:
//! - Append-only volume files packing needles (header + payload)
//! - In-memory key → offset index per volume, rebuilt on open
//! - fsync before every acknowledged write
//! - Single-writer/multi-reader concurrency per volume
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │             (META descriptor, key % N routing)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────┐ ┌─────────────┐
//!   │   vol-0     │ │  vol-1  │ │  vol-N-1    │
//!   │ (Mutex +    │ │   ...   │ │             │
//!   │  RwLock)    │ │         │ │             │
//!   └──────┬──────┘ └─────────┘ └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────────────────────────────┐
//!   │ [header][needle][needle][needle]... │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod binary;
pub mod needle;
pub mod volume;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{NeedleError, Result};
pub use config::{Config, RecoveryMode};
pub use needle::Needle;
pub use store::Store;
pub use volume::Volume;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of needlestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
