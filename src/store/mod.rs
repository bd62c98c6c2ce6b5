//! Store Module
//!
//! A store is a directory holding a `META` descriptor and a fixed number of
//! volume files:
//!
//! ```text
//! {path}/
//!   ├── META       (name, volume_cnt, max_volume_size)
//!   ├── vol-0
//!   ├── vol-1
//!   └── ...
//! ```
//!
//! ## Routing
//! `key % volume_cnt` picks the volume for the routed `put`/`read` helpers.
//! Callers that place keys themselves can address volumes directly with
//! [`Store::volume`].

mod meta;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::Config;
use crate::error::{NeedleError, Result};
use crate::needle::{Needle, HEADER_SIZE};
use crate::volume::{Volume, VOLUME_HEADER_SIZE};

pub use meta::{StoreMeta, META_FILENAME};

/// A named, fixed-size collection of volumes
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    meta: StoreMeta,
    volumes: Vec<Volume>,
}

impl Store {
    /// Create a new store directory with `volume_cnt` empty volumes.
    ///
    /// Either the whole store is created or nothing is: if any step after
    /// creating the directory fails, the directory is removed again.
    pub fn create(name: &str, path: &Path, volume_cnt: usize, max_volume_size: u64) -> Result<()> {
        if volume_cnt == 0 {
            return Err(NeedleError::Format(
                "a store needs at least one volume".to_string(),
            ));
        }
        // Volume ids are u32, so ids 0..volume_cnt must fit
        if u32::try_from(volume_cnt - 1).is_err() {
            return Err(NeedleError::Format(format!(
                "{} volumes exceed the volume id range",
                volume_cnt
            )));
        }
        if max_volume_size < VOLUME_HEADER_SIZE + HEADER_SIZE {
            return Err(NeedleError::Format(format!(
                "max volume size {} cannot hold a single needle (minimum {})",
                max_volume_size,
                VOLUME_HEADER_SIZE + HEADER_SIZE
            )));
        }
        if path.exists() {
            return Err(NeedleError::AlreadyExists(path.to_path_buf()));
        }

        fs::create_dir(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => NeedleError::AlreadyExists(path.to_path_buf()),
            _ => NeedleError::Io(e),
        })?;
        let mut guard = CreateGuard::new(path);

        let meta = StoreMeta {
            name: name.to_string(),
            volume_cnt,
            max_volume_size,
        };
        meta.write(path)?;

        for i in 0..volume_cnt {
            Volume::create(&Self::volume_path(path, i), i as u32, max_volume_size)?;
        }

        guard.disarm();
        tracing::info!(
            "Created store {:?} at {:?}: {} volumes x {} bytes",
            name,
            path,
            volume_cnt,
            max_volume_size
        );
        Ok(())
    }

    /// Open an existing store with the default config
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Open an existing store
    ///
    /// Reads META, then opens `vol-0 .. vol-{N-1}` in order. The first
    /// volume that fails to open aborts the whole open.
    pub fn open_with_config(path: &Path, config: Config) -> Result<Self> {
        let meta = StoreMeta::read(path)?;
        if meta.volume_cnt == 0 {
            return Err(NeedleError::Format("META declares zero volumes".to_string()));
        }

        let mut volumes = Vec::with_capacity(meta.volume_cnt);
        for i in 0..meta.volume_cnt {
            let volume = Volume::open_with_config(&Self::volume_path(path, i), config.clone())?;

            if volume.id() as usize != i {
                return Err(NeedleError::Format(format!(
                    "vol-{} carries volume id {}",
                    i,
                    volume.id()
                )));
            }
            if volume.max_size() != meta.max_volume_size {
                return Err(NeedleError::Format(format!(
                    "vol-{} has max size {}, META says {}",
                    i,
                    volume.max_size(),
                    meta.max_volume_size
                )));
            }
            volumes.push(volume);
        }

        tracing::info!(
            "Opened store {:?} at {:?} with {} volumes",
            meta.name,
            path,
            volumes.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            meta,
            volumes,
        })
    }

    // =========================================================================
    // Routed Operations
    // =========================================================================

    /// Index of the volume that owns `key`
    pub fn volume_index_for(&self, key: u64) -> usize {
        (key % self.volumes.len() as u64) as usize
    }

    /// Volume that owns `key`
    pub fn volume_for(&self, key: u64) -> &Volume {
        &self.volumes[self.volume_index_for(key)]
    }

    /// Put a needle into the volume that owns `key`
    pub fn put<R: Read>(&self, key: u64, size: u64, checksum: u32, payload: R) -> Result<()> {
        self.volume_for(key).put(key, size, checksum, payload)
    }

    /// Put an in-memory payload into the volume that owns `key`
    pub fn put_bytes(&self, key: u64, checksum: u32, payload: &[u8]) -> Result<()> {
        self.volume_for(key).put_bytes(key, checksum, payload)
    }

    /// Read `key` from the volume that owns it
    pub fn read(&self, key: u64) -> Result<(Needle, Bytes)> {
        self.volume_for(key).read(key)
    }

    /// Close every volume, returning the first error encountered
    pub fn close(self) -> Result<()> {
        let mut first_err = None;
        for volume in self.volumes {
            let id = volume.id();
            if let Err(e) = volume.close() {
                tracing::warn!("Failed to close volume {}: {}", id, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn volume_count(&self) -> usize {
        self.meta.volume_cnt
    }

    pub fn max_volume_size(&self) -> u64 {
        self.meta.max_volume_size
    }

    /// Volume by index, for callers that place keys themselves
    pub fn volume(&self, index: usize) -> Result<&Volume> {
        self.volumes.get(index).ok_or(NeedleError::VolumeOutOfRange {
            index,
            count: self.volumes.len(),
        })
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Path of volume `index` inside a store directory
    pub fn volume_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("vol-{}", index))
    }
}

/// Removes a half-created store directory unless disarmed
struct CreateGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> CreateGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CreateGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Store creation failed, removing {:?}", self.path);
        if let Err(e) = fs::remove_dir_all(self.path) {
            tracing::warn!("Cleanup of {:?} failed: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_partial_store() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial");
        fs::create_dir(&path).unwrap();
        StoreMeta {
            name: "partial".to_string(),
            volume_cnt: 2,
            max_volume_size: 4096,
        }
        .write(&path)
        .unwrap();
        Volume::create(&Store::volume_path(&path, 0), 0, 4096).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_armed_guard_removes_directory() {
        let (_temp, path) = setup_partial_store();

        {
            let _guard = CreateGuard::new(&path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_disarmed_guard_keeps_directory() {
        let (_temp, path) = setup_partial_store();

        {
            let mut guard = CreateGuard::new(&path);
            guard.disarm();
        }

        assert!(path.join(META_FILENAME).is_file());
        assert!(Store::volume_path(&path, 0).is_file());
    }
}
