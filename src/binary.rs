//! Binary primitives
//!
//! Fixed-width little-endian integers over `Read`/`Write`. A read either
//! consumes the full width or fails with `UnexpectedEof`; nothing is rolled
//! back on failure.

use std::io::{Read, Write};

use crate::error::Result;

pub fn write_u32<W: Write + ?Sized>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn write_u64<W: Write + ?Sized>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_u8<R: Read + ?Sized>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a fixed-size byte array (magic constants)
pub fn read_array<const N: usize, R: Read + ?Sized>(r: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
