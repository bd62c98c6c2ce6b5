//! Configuration for needlestore
//!
//! Centralized configuration with sensible defaults.

/// Options applied when opening volumes (directly or through a store)
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Integrity Configuration
    // -------------------------------------------------------------------------
    /// Validate volume and needle magic bytes on open, scan and read
    pub verify_magic: bool,

    /// Recompute CRC32 of every payload on read and compare with the
    /// stored checksum. Only meaningful when writers store CRC32 values
    /// (see [`crate::needle::checksum`]).
    pub verify_checksum: bool,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// How the in-memory index is rebuilt when a volume is opened
    pub recovery: RecoveryMode,

    /// Persist the index to `vol-{id}.idx` when a volume is closed
    pub write_index_snapshot: bool,
}

/// Index rebuild strategy on open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Start with an empty index; appends continue at end of file
    None,

    /// Replay every needle header, truncating an incomplete tail
    Scan,

    /// Load the index snapshot if it is still valid, else fall back to `Scan`
    Snapshot,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verify_magic: true,
            verify_checksum: false,
            recovery: RecoveryMode::Scan,
            write_index_snapshot: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable magic byte validation
    pub fn verify_magic(mut self, enabled: bool) -> Self {
        self.config.verify_magic = enabled;
        self
    }

    /// Enable or disable CRC32 payload verification on read
    pub fn verify_checksum(mut self, enabled: bool) -> Self {
        self.config.verify_checksum = enabled;
        self
    }

    /// Set the recovery mode used on open
    pub fn recovery(mut self, mode: RecoveryMode) -> Self {
        self.config.recovery = mode;
        self
    }

    /// Enable or disable index snapshots on close
    pub fn write_index_snapshot(mut self, enabled: bool) -> Self {
        self.config.write_index_snapshot = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
