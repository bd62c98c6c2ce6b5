//! Tests for binary primitives and the needle header codec
//!
//! These tests verify:
//! - Little-endian fixed-width integers
//! - Header layout and size
//! - Short-read and bad-magic handling

use std::io::Cursor;

use needlestore::binary::{read_u32, read_u64, write_u32, write_u64};
use needlestore::needle::{
    self, decode_header, encode_header, write_header, Needle, HEADER_SIZE, NEEDLE_MAGIC,
};
use needlestore::NeedleError;

// =============================================================================
// Binary Primitive Tests
// =============================================================================

#[test]
fn test_write_u32_little_endian() {
    let mut buf = Vec::new();
    write_u32(&mut buf, 0x0102_0304).unwrap();
    assert_eq!(buf, vec![0x04, 0x03, 0x02, 0x01]);
}

#[test]
fn test_write_u64_little_endian() {
    let mut buf = Vec::new();
    write_u64(&mut buf, 1).unwrap();
    assert_eq!(buf, vec![1, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_read_consumes_exact_width() {
    let mut cursor = Cursor::new(vec![0xff, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 0xaa]);
    assert_eq!(read_u32(&mut cursor).unwrap(), 255);
    assert_eq!(read_u64(&mut cursor).unwrap(), 7);
    assert_eq!(cursor.position(), 12);
}

#[test]
fn test_short_read_fails() {
    let mut cursor = Cursor::new(vec![1, 2, 3]);
    let err = read_u32(&mut cursor).unwrap_err();
    assert!(err.is_short_read());

    let mut cursor = Cursor::new(vec![1, 2, 3, 4, 5, 6, 7]);
    let err = read_u64(&mut cursor).unwrap_err();
    assert!(err.is_short_read());
}

// =============================================================================
// Header Layout Tests
// =============================================================================

#[test]
fn test_header_size_is_fixed() {
    assert_eq!(HEADER_SIZE, 23);
    assert_eq!(needle::header_size(), 23);
}

#[test]
fn test_encode_header_layout() {
    let n = Needle::new(0, 0x1122_3344_5566_7788, 5, 0xdead_beef);
    let bytes = encode_header(&n);

    assert_eq!(bytes.len(), 23);
    assert_eq!(&bytes[0..2], &NEEDLE_MAGIC);
    assert_eq!(&bytes[2..10], &0x1122_3344_5566_7788u64.to_le_bytes());
    assert_eq!(bytes[10], 0); // flag
    assert_eq!(&bytes[11..19], &5u64.to_le_bytes());
    assert_eq!(&bytes[19..23], &0xdead_beefu32.to_le_bytes());
}

#[test]
fn test_write_header_matches_encode() {
    let n = Needle::new(0, 9, 100, 3);
    let mut buf = Vec::new();
    write_header(&mut buf, &n).unwrap();
    assert_eq!(buf, encode_header(&n).to_vec());
}

#[test]
fn test_decode_header_carries_offset() {
    let n = Needle::new(0, 123, 5, 112);
    let bytes = encode_header(&n);

    let decoded = decode_header(&mut &bytes[..], 4096, true).unwrap();

    assert_eq!(decoded.offset, 4096);
    assert_eq!(decoded.key, 123);
    assert_eq!(decoded.flag, 0);
    assert_eq!(decoded.size, 5);
    assert_eq!(decoded.checksum, 112);
}

#[test]
fn test_decode_truncated_header_fails() {
    let bytes = encode_header(&Needle::new(0, 1, 1, 1));
    let err = decode_header(&mut &bytes[..22], 0, true).unwrap_err();
    assert!(err.is_short_read());
}

#[test]
fn test_decode_bad_magic() {
    let mut bytes = encode_header(&Needle::new(0, 1, 1, 1)).to_vec();
    bytes[0] = 0x00;

    let err = decode_header(&mut &bytes[..], 0, true).unwrap_err();
    assert!(matches!(err, NeedleError::Corruption(_)));

    // Lenient decoding skips the magic check
    let decoded = decode_header(&mut &bytes[..], 0, false).unwrap();
    assert_eq!(decoded.key, 1);
}

// =============================================================================
// Size Accounting Tests
// =============================================================================

#[test]
fn test_total_size_and_end_offset() {
    let n = Needle::new(14, 1, 5, 0);
    assert_eq!(n.total_size(), 28);
    assert_eq!(n.end_offset(), Some(42));

    let empty = Needle::new(14, 2, 0, 0);
    assert_eq!(empty.total_size(), HEADER_SIZE);
}

#[test]
fn test_huge_size_does_not_overflow() {
    let n = Needle::new(14, 1, u64::MAX, 0);
    assert_eq!(n.total_size(), u64::MAX);
    assert_eq!(n.end_offset(), None);

    let n = Needle::new(0, 1, u64::MAX - HEADER_SIZE, 0);
    assert_eq!(n.end_offset(), Some(u64::MAX));
}

#[test]
fn test_checksum_is_crc32() {
    assert_eq!(needle::checksum(b""), 0);
    assert_eq!(needle::checksum(b"hello"), 0x3610_a686);
}
