//! Volume Module
//!
//! A volume is one append-only file of needles plus an in-memory
//! key → offset index.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header (14 bytes)                           │
//! │   Magic (2) | Volume Id: u32 | MaxSize: u64 │
//! ├─────────────────────────────────────────────┤
//! │ Needle 0   [23-byte header][payload]        │
//! ├─────────────────────────────────────────────┤
//! │ Needle 1   [23-byte header][payload]        │
//! │ ...                                         │
//! └─────────────────────────────────────────────┘
//! ```
//! The file never grows past `max_size` (header included).

mod header;
mod index;
mod io;
mod recovery;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::config::{Config, RecoveryMode};
use crate::error::{NeedleError, Result};
use crate::needle::{self, Needle, HEADER_SIZE};

pub use header::{VolumeHeader, VOLUME_HEADER_SIZE, VOLUME_MAGIC};
pub use index::Index;
pub use recovery::{RecoveryResult, VolumeRecovery};

use self::io::{read_exact_at, write_all_at};

/// Payload copy buffer used by `put`
const COPY_BUF_SIZE: usize = 64 * 1024;

/// Write handle plus whether an index snapshot may still be on disk
struct VolumeWriter {
    file: File,
    snapshot_live: bool,
}

/// Mutable state guarded by the volume's RwLock
struct VolumeState {
    /// Offset where the next needle will be written
    cur: u64,
    index: Index,
}

/// A single append-only needle file
///
/// ## Concurrency:
/// - `writer`: Mutex held for the whole put (capacity check, write, fsync,
///   index update), so writers are serialized per volume
/// - `state`: RwLock over `{cur, index}`; writers take it exclusively only
///   after the fsync, readers take it shared for the lookup
/// - `reader`: positioned reads only, shared without locking
/// - All methods use `&self`; different volumes share nothing
pub struct Volume {
    path: PathBuf,
    id: u32,
    max_size: u64,
    config: Config,
    writer: Mutex<VolumeWriter>,
    reader: File,
    state: RwLock<VolumeState>,
    recovery: Option<RecoveryResult>,
}

impl Volume {
    /// Create a new volume file and write its header.
    ///
    /// Fails with `AlreadyExists` if `path` names anything. The volume is
    /// not opened; call [`Volume::open`] before use.
    pub fn create(path: &Path, id: u32, max_size: u64) -> Result<()> {
        if max_size < VOLUME_HEADER_SIZE {
            return Err(NeedleError::Format(format!(
                "max volume size {} is smaller than the volume header ({} bytes)",
                max_size, VOLUME_HEADER_SIZE
            )));
        }
        if path.exists() {
            return Err(NeedleError::AlreadyExists(path.to_path_buf()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => NeedleError::AlreadyExists(path.to_path_buf()),
                _ => NeedleError::Io(e),
            })?;

        VolumeHeader { id, max_size }.write_to(&mut file)?;
        file.sync_all()?;

        // A snapshot left by an earlier volume at this path must not be
        // mistaken for this one.
        Index::remove_snapshot(&Self::snapshot_path(path))?;

        tracing::debug!("Created volume {} at {:?} (max_size={})", id, path, max_size);
        Ok(())
    }

    /// Open an existing volume with the default config
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Open an existing volume
    ///
    /// On open:
    /// 1. Open the write handle and parse the header
    /// 2. Rebuild the index according to `config.recovery`
    /// 3. Open a second handle for positioned reads
    pub fn open_with_config(path: &Path, config: Config) -> Result<Self> {
        let mut writer = OpenOptions::new().read(true).write(true).open(path)?;
        let header = VolumeHeader::read_from(&mut writer, config.verify_magic)?;
        let file_len = writer.metadata()?.len();

        let snapshot_path = Self::snapshot_path(path);
        let (index, cur, recovery) = match config.recovery {
            RecoveryMode::None => (Index::new(), file_len, None),
            RecoveryMode::Scan => {
                Self::recover(&writer, &header, config.verify_magic)?
            }
            RecoveryMode::Snapshot => {
                match Index::load_snapshot(&snapshot_path, header.id, file_len)? {
                    Some(index) => {
                        tracing::debug!(
                            "Volume {}: loaded {} keys from snapshot",
                            header.id,
                            index.len()
                        );
                        (index, file_len, None)
                    }
                    None => Self::recover(&writer, &header, config.verify_magic)?,
                }
            }
        };
        let reader = OpenOptions::new().read(true).open(path)?;

        tracing::info!(
            "Opened volume {} at {:?}: {} keys, cur={}, max_size={}",
            header.id,
            path,
            index.len(),
            cur,
            header.max_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            id: header.id,
            max_size: header.max_size,
            config,
            writer: Mutex::new(VolumeWriter {
                file: writer,
                snapshot_live: true,
            }),
            reader,
            state: RwLock::new(VolumeState { cur, index }),
            recovery,
        })
    }

    fn recover(
        file: &File,
        header: &VolumeHeader,
        verify_magic: bool,
    ) -> Result<(Index, u64, Option<RecoveryResult>)> {
        let (index, result) = VolumeRecovery::recover(file, header, verify_magic)?;
        Ok((index, result.valid_len, Some(result)))
    }

    /// Append a needle whose payload is read from `payload`.
    ///
    /// Exactly `size` bytes are consumed from `payload`. The index entry is
    /// published only after the needle is fsynced. A failed put leaves the
    /// cursor where it was and cuts the file back to it.
    pub fn put<R: Read>(&self, key: u64, size: u64, checksum: u32, mut payload: R) -> Result<()> {
        let mut writer = self.writer.lock();

        let offset = self.state.read().cur;
        let needle = Needle::new(offset, key, size, checksum);

        // Capacity check before any byte touches the file
        let needed = needle.total_size();
        let available = self.max_size.saturating_sub(offset);
        if needed > available {
            return Err(NeedleError::NoRoom { needed, available });
        }

        // The first write makes any snapshot on disk stale
        if writer.snapshot_live {
            Index::remove_snapshot(&Self::snapshot_path(&self.path))?;
            writer.snapshot_live = false;
        }

        if let Err(e) = Self::append(&writer.file, &needle, &mut payload) {
            // A leftover partial needle would sit behind later, shorter ones
            if let Err(trim_err) = writer.file.set_len(offset) {
                tracing::warn!(
                    "Volume {}: failed to cut partial needle at {}: {}",
                    self.id,
                    offset,
                    trim_err
                );
            }
            return Err(e);
        }

        let mut state = self.state.write();
        state.index.insert(key, offset);
        state.cur = offset + needed;

        tracing::trace!("Volume {}: put key={} offset={} size={}", self.id, key, offset, size);
        Ok(())
    }

    /// Append a needle from an in-memory payload
    pub fn put_bytes(&self, key: u64, checksum: u32, payload: &[u8]) -> Result<()> {
        self.put(key, payload.len() as u64, checksum, payload)
    }

    /// Read the latest needle stored under `key`
    pub fn read(&self, key: u64) -> Result<(Needle, Bytes)> {
        let (offset, cur) = {
            let state = self.state.read();
            match state.index.get(key) {
                Some(offset) => (offset, state.cur),
                None => return Err(NeedleError::KeyNotFound(key)),
            }
        };

        let mut buf = [0u8; HEADER_SIZE as usize];
        read_exact_at(&self.reader, &mut buf, offset)?;
        let needle = needle::decode_header(&mut &buf[..], offset, self.config.verify_magic)?;

        if needle.key != key {
            return Err(NeedleError::Corruption(format!(
                "Index points key {} at offset {}, but needle there has key {}",
                key, offset, needle.key
            )));
        }
        match needle.end_offset() {
            Some(end) if end <= cur => {}
            _ => {
                return Err(NeedleError::Corruption(format!(
                    "Needle {} at offset {} claims {} payload bytes, past the end of written data ({})",
                    key, offset, needle.size, cur
                )))
            }
        }

        let mut payload = vec![0u8; needle.size as usize];
        read_exact_at(&self.reader, &mut payload, offset + HEADER_SIZE)?;

        if self.config.verify_checksum {
            let computed = needle::checksum(&payload);
            if computed != needle.checksum {
                return Err(NeedleError::ChecksumMismatch {
                    key,
                    stored: needle.checksum,
                    computed,
                });
            }
        }

        Ok((needle, Bytes::from(payload)))
    }

    /// Force everything written so far to stable storage
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().file.sync_all()?;
        Ok(())
    }

    /// Flush durability and release both handles.
    ///
    /// Bytes past the cursor (left by a failed put) are cut off, and the
    /// index is snapshotted when `write_index_snapshot` is set.
    pub fn close(self) -> Result<()> {
        let writer = self.writer.into_inner().file;
        let state = self.state.into_inner();

        if writer.metadata()?.len() > state.cur {
            writer.set_len(state.cur)?;
        }
        writer.sync_all()?;

        if self.config.write_index_snapshot {
            state
                .index
                .save_snapshot(&Self::snapshot_path(&self.path), self.id, state.cur)?;
        }

        tracing::debug!("Closed volume {} ({} keys, cur={})", self.id, state.index.len(), state.cur);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Offset at which the next needle will be written
    pub fn cur(&self) -> u64 {
        self.state.read().cur
    }

    /// Bytes left before the volume is full
    pub fn free_space(&self) -> u64 {
        self.max_size.saturating_sub(self.cur())
    }

    /// Number of distinct keys in the index
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.state.read().index.contains(key)
    }

    /// Offset of the latest needle for `key`
    pub fn offset_of(&self, key: u64) -> Option<u64> {
        self.state.read().index.get(key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outcome of the recovery scan run on open, if one ran
    pub fn recovery(&self) -> Option<&RecoveryResult> {
        self.recovery.as_ref()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Index snapshot path: `vol-3` → `vol-3.idx`
    fn snapshot_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".idx");
        PathBuf::from(name)
    }

    /// Write header and payload at the needle's offset, then fsync
    fn append<R: Read>(file: &File, needle: &Needle, payload: &mut R) -> Result<()> {
        needle::write_header(&mut WriteAt::new(file, needle.offset), needle)?;
        Self::copy_payload(file, payload, needle.offset + HEADER_SIZE, needle.size)?;
        file.sync_all()?;
        Ok(())
    }

    /// Copy exactly `size` bytes from `src` to `file` starting at `offset`
    fn copy_payload<R: Read>(file: &File, src: &mut R, mut offset: u64, size: u64) -> Result<()> {
        let mut buf = vec![0u8; COPY_BUF_SIZE.min(size as usize)];
        let mut remaining = size;

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = match src.read(&mut buf[..want]) {
                Ok(0) => {
                    return Err(NeedleError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        format!("payload source ended {} bytes short", remaining),
                    )))
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            write_all_at(file, &buf[..n], offset)?;
            offset += n as u64;
            remaining -= n as u64;
        }

        Ok(())
    }
}

/// `Write` adapter that writes at a moving offset without seeking
struct WriteAt<'a> {
    file: &'a File,
    offset: u64,
}

impl<'a> WriteAt<'a> {
    fn new(file: &'a File, offset: u64) -> Self {
        Self { file, offset }
    }
}

impl std::io::Write for WriteAt<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        write_all_at(self.file, buf, self.offset)?;
        self.offset += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("max_size", &self.max_size)
            .field("cur", &self.cur())
            .finish()
    }
}
