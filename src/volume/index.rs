//! In-memory needle index
//!
//! Maps needle key → header offset. Lives in memory; `save_snapshot` and
//! `load_snapshot` persist it next to the volume file so a clean reopen can
//! skip the recovery scan.
//!
//! ## Snapshot Format
//! ```text
//! ┌─────────────────────────────────────┬───────────┐
//! │ bincode(IndexSnapshot)              │ CRC32 (4) │
//! └─────────────────────────────────────┴───────────┘
//! ```

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NeedleError, Result};

const SNAPSHOT_MAGIC: [u8; 8] = *b"NDLIDX01";

/// On-disk form of the index
#[derive(Debug, Serialize, Deserialize)]
struct IndexSnapshot {
    magic: [u8; 8],
    volume_id: u32,
    /// Append cursor (= volume file length) at the time of the snapshot
    cur: u64,
    entries: Vec<(u64, u64)>,
}

/// Key → offset map, last writer wins
#[derive(Debug, Default, Clone)]
pub struct Index {
    map: HashMap<u64, u64>,
}

impl Index {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert or replace the offset for a key, returning the shadowed one
    pub fn insert(&mut self, key: u64, offset: u64) -> Option<u64> {
        self.map.insert(key, offset)
    }

    pub fn get(&self, key: u64) -> Option<u64> {
        self.map.get(&key).copied()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.map.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.map.iter().map(|(&k, &v)| (k, v))
    }

    /// Write the index to `path` atomically (temp file + rename)
    pub fn save_snapshot(&self, path: &Path, volume_id: u32, cur: u64) -> Result<()> {
        let mut entries: Vec<(u64, u64)> = self.iter().collect();
        entries.sort_unstable();

        let snapshot = IndexSnapshot {
            magic: SNAPSHOT_MAGIC,
            volume_id,
            cur,
            entries,
        };
        let mut data = bincode::serialize(&snapshot)
            .map_err(|e| NeedleError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let tmp_path = path.with_extension("idx.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        tracing::debug!(
            "Saved index snapshot {:?}: {} keys, cur={}",
            path,
            self.len(),
            cur
        );
        Ok(())
    }

    /// Load a snapshot if it exists and still describes the volume.
    ///
    /// Returns `Ok(None)` when the snapshot is missing, fails its CRC,
    /// belongs to another volume, or was taken at a different file length
    /// (writes happened after it, or the file was truncated).
    pub fn load_snapshot(path: &Path, volume_id: u32, file_len: u64) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.len() < 4 {
            tracing::warn!("Index snapshot {:?} too short, ignoring", path);
            return Ok(None);
        }

        let (body, footer) = data.split_at(data.len() - 4);
        let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        if crc32fast::hash(body) != stored_crc {
            tracing::warn!("Index snapshot {:?} failed CRC check, ignoring", path);
            return Ok(None);
        }

        let snapshot: IndexSnapshot = match bincode::deserialize(body) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Index snapshot {:?} undecodable ({}), ignoring", path, e);
                return Ok(None);
            }
        };

        if snapshot.magic != SNAPSHOT_MAGIC
            || snapshot.volume_id != volume_id
            || snapshot.cur != file_len
        {
            tracing::warn!(
                "Index snapshot {:?} is stale (volume {}, cur {}; file len {}), ignoring",
                path,
                snapshot.volume_id,
                snapshot.cur,
                file_len
            );
            return Ok(None);
        }

        let map = snapshot.entries.into_iter().collect();
        Ok(Some(Self { map }))
    }

    /// Remove a snapshot file if present
    pub fn remove_snapshot(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
