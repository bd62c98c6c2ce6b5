//! Needle header codec
//!
//! Encoding and decoding of the fixed needle header.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::binary::{read_array, read_u64, read_u8, read_u32};
use crate::error::{NeedleError, Result};

use super::{Needle, HEADER_SIZE, NEEDLE_MAGIC};

/// Encode a needle header to bytes
///
/// Format: magic (2) + key (8) + flag (1) + size (8) + checksum (4)
pub fn encode_header(needle: &Needle) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
    buf.put_slice(&NEEDLE_MAGIC);
    buf.put_u64_le(needle.key);
    buf.put_u8(needle.flag);
    buf.put_u64_le(needle.size);
    buf.put_u32_le(needle.checksum);
    buf
}

/// Write an encoded needle header to a sink
pub fn write_header<W: Write + ?Sized>(w: &mut W, needle: &Needle) -> Result<()> {
    w.write_all(&encode_header(needle))?;
    Ok(())
}

/// Decode a needle header from a source
///
/// Consumes exactly `HEADER_SIZE` bytes. The returned needle carries
/// `offset`, which is not part of the encoding. With `verify_magic` a
/// header that does not start with the needle magic is rejected as
/// corruption.
pub fn decode_header<R: Read + ?Sized>(r: &mut R, offset: u64, verify_magic: bool) -> Result<Needle> {
    let magic: [u8; 2] = read_array(r)?;
    if verify_magic && magic != NEEDLE_MAGIC {
        return Err(NeedleError::Corruption(format!(
            "Invalid needle magic at offset {}: expected {:02x?}, got {:02x?}",
            offset, NEEDLE_MAGIC, magic
        )));
    }

    let key = read_u64(r)?;
    let flag = read_u8(r)?;
    let size = read_u64(r)?;
    let checksum = read_u32(r)?;

    Ok(Needle {
        offset,
        key,
        flag,
        size,
        checksum,
    })
}
