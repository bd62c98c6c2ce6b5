//! Volume Recovery
//!
//! Rebuilds the in-memory index on open by replaying every needle header
//! from the end of the volume header. A record that is incomplete (short
//! header, payload past end of file, payload past `max_size`) marks the end
//! of valid data; everything after it is a torn write and gets truncated.
//!
//! A complete-length record with bad magic is only treated as a torn tail
//! when no well-formed needle follows it. Otherwise the volume is corrupt in
//! the middle and the scan fails without touching the file.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{NeedleError, Result};
use crate::needle::{self, Needle, HEADER_SIZE, NEEDLE_MAGIC};

use super::header::{VolumeHeader, VOLUME_HEADER_SIZE};
use super::index::Index;
use super::io::read_exact_at;

/// Window used when searching past a bad record
const SEARCH_WINDOW: u64 = 64 * 1024;

/// Handles volume recovery after crash
pub struct VolumeRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of complete needles replayed (including shadowed keys)
    pub needles_recovered: u64,

    /// File length covered by complete needles; the new append cursor
    pub valid_len: u64,

    /// Bytes past `valid_len` (removed when truncation is applied)
    pub bytes_truncated: u64,

    /// Whether the file was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl VolumeRecovery {
    /// Scan an open volume file and truncate any torn tail.
    ///
    /// `file` must be opened for writing. The truncation is fsynced before
    /// returning.
    pub fn recover(
        file: &File,
        header: &VolumeHeader,
        verify_magic: bool,
    ) -> Result<(Index, RecoveryResult)> {
        let (index, mut result) = Self::scan(file, header, verify_magic)?;

        if result.bytes_truncated > 0 {
            tracing::warn!(
                "Volume {}: truncating {} trailing bytes after offset {}",
                header.id,
                result.bytes_truncated,
                result.valid_len
            );
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;
        }

        Ok((index, result))
    }

    /// Verify integrity of a volume file without modifying it
    pub fn verify(path: &Path, verify_magic: bool) -> Result<RecoveryResult> {
        let mut file = OpenOptions::new().read(true).open(path)?;
        let header = VolumeHeader::read_from(&mut file, verify_magic)?;
        let (_, result) = Self::scan(&file, &header, verify_magic)?;
        Ok(result)
    }

    fn scan(file: &File, header: &VolumeHeader, verify_magic: bool) -> Result<(Index, RecoveryResult)> {
        let file_len = file.metadata()?.len();
        let limit = file_len.min(header.max_size);

        let mut index = Index::new();
        let mut needles_recovered = 0u64;
        let mut offset = VOLUME_HEADER_SIZE;
        let mut buf = [0u8; HEADER_SIZE as usize];

        while offset + HEADER_SIZE <= limit {
            read_exact_at(file, &mut buf, offset)?;

            let needle: Needle = match needle::decode_header(&mut &buf[..], offset, verify_magic) {
                Ok(n) => n,
                Err(e) => {
                    if let Some(next) = Self::find_next_needle(file, offset + 1, limit)? {
                        return Err(NeedleError::Corruption(format!(
                            "volume {}: bad needle at offset {} followed by a valid needle at {} ({})",
                            header.id, offset, next, e
                        )));
                    }
                    tracing::debug!("Volume {}: scan stopped at {}: {}", header.id, offset, e);
                    break;
                }
            };

            match offset.checked_add(needle.total_size()) {
                Some(end) if end <= limit => {
                    index.insert(needle.key, offset);
                    needles_recovered += 1;
                    offset = end;
                }
                _ => break,
            }
        }

        let valid_len = offset.min(file_len);
        let result = RecoveryResult {
            needles_recovered,
            valid_len,
            bytes_truncated: file_len - valid_len,
            was_truncated: false,
        };
        Ok((index, result))
    }

    /// Position of the first complete, magic-tagged needle at or after `from`
    fn find_next_needle(file: &File, from: u64, limit: u64) -> Result<Option<u64>> {
        let header_len = HEADER_SIZE as usize;
        let mut start = from;

        while start + HEADER_SIZE <= limit {
            let len = SEARCH_WINDOW.min(limit - start);
            let mut chunk = vec![0u8; len as usize];
            read_exact_at(file, &mut chunk, start)?;

            for i in 0..=(chunk.len() - header_len) {
                if chunk[i..i + 2] != NEEDLE_MAGIC {
                    continue;
                }
                let pos = start + i as u64;
                let candidate = needle::decode_header(&mut &chunk[i..i + header_len], pos, true)?;
                if matches!(candidate.end_offset(), Some(end) if end <= limit) {
                    return Ok(Some(pos));
                }
            }

            // Overlap windows so a header across the edge is still seen
            start += len - HEADER_SIZE + 1;
        }

        Ok(None)
    }
}
