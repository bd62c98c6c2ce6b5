//! Needle Module
//!
//! A needle is one stored object: a fixed 23-byte header followed by the
//! payload bytes.
//!
//! ## Record Format
//! ```text
//! ┌───────────┬─────────┬──────────┬──────────┬──────────────┬───────────┐
//! │ Magic (2) │ Key (8) │ Flag (1) │ Size (8) │ Checksum (4) │ Payload   │
//! └───────────┴─────────┴──────────┴──────────┴──────────────┴───────────┘
//! ```
//! All integers are little-endian. The offset of a needle is not part of the
//! record; it is where the record starts inside its volume file.

mod codec;

pub use codec::{decode_header, encode_header, write_header};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes at the start of every needle header
pub const NEEDLE_MAGIC: [u8; 2] = [0xbe, 0xef];

/// Header size: Magic (2) + Key (8) + Flag (1) + Size (8) + Checksum (4)
pub const HEADER_SIZE: u64 = 2 + 8 + 1 + 8 + 4;

/// Fixed needle header length in bytes
pub const fn header_size() -> u64 {
    HEADER_SIZE
}

/// Compute the CRC32 of a payload.
///
/// Checksums are opaque to the volume; use this when the store is opened
/// with `verify_checksum` so reads can validate payloads.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

// =============================================================================
// Needle Metadata
// =============================================================================

/// Decoded needle header plus its location inside the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Needle {
    /// Byte position of the header within the volume file
    pub offset: u64,
    /// Caller-supplied key
    pub key: u64,
    /// Reserved, always written as 0
    pub flag: u8,
    /// Payload length in bytes
    pub size: u64,
    /// Caller-supplied integrity value
    pub checksum: u32,
}

impl Needle {
    pub fn new(offset: u64, key: u64, size: u64, checksum: u32) -> Self {
        Self {
            offset,
            key,
            flag: 0,
            size,
            checksum,
        }
    }

    /// Header plus payload length. The write path, the capacity check and
    /// the recovery scan all advance offsets by this value.
    ///
    /// Saturates at `u64::MAX`, which no volume can hold, so an absurd
    /// `size` fails the capacity check instead of wrapping.
    pub fn total_size(&self) -> u64 {
        HEADER_SIZE.saturating_add(self.size)
    }

    /// Offset where the next needle starts, `None` on overflow
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.total_size())
    }
}
