//! Volume header
//!
//! The 14-byte prefix written once when a volume file is created.

use std::io::{Read, Write};

use crate::binary::{read_array, read_u32, read_u64, write_u32, write_u64};
use crate::error::{NeedleError, Result};

/// Magic bytes at the start of every volume file
pub const VOLUME_MAGIC: [u8; 2] = [0xef, 0xef];

/// Header size: Magic (2) + Id (4) + MaxSize (8) = 14 bytes
pub const VOLUME_HEADER_SIZE: u64 = 2 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    pub id: u32,
    pub max_size: u64,
}

impl VolumeHeader {
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        w.write_all(&VOLUME_MAGIC)?;
        write_u32(w, self.id)?;
        write_u64(w, self.max_size)?;
        Ok(())
    }

    pub fn read_from<R: Read + ?Sized>(r: &mut R, verify_magic: bool) -> Result<Self> {
        let magic: [u8; 2] = read_array(r)?;
        if verify_magic && magic != VOLUME_MAGIC {
            return Err(NeedleError::Corruption(format!(
                "Invalid volume magic: expected {:02x?}, got {:02x?}",
                VOLUME_MAGIC, magic
            )));
        }

        let id = read_u32(r)?;
        let max_size = read_u64(r)?;
        Ok(Self { id, max_size })
    }
}
