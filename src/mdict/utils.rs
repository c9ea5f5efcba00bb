//! Low-level byte-cursor utilities.
//!
//! Every variable-width big-endian integer in the format goes through
//! [`read_number`]; the 1/2-byte text-length prefixes of the key-block-info
//! table go through [`read_small_number`]. Both operate on a `&mut &[u8]`
//! cursor and fail with `CorruptFormat` when the table runs short, which is
//! the only way an in-memory table can be truncated.

use super::error::{MdictError, Result};

/// Split `len` bytes off the front of the cursor.
pub fn take<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(MdictError::CorruptFormat(format!(
            "table ended early: need {} bytes, {} left",
            len,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

/// Fold big-endian bytes into an unsigned integer.
pub fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Read a 4 or 8 byte big-endian number; the width is fixed by the format
/// version after header negotiation.
pub fn read_number(cursor: &mut &[u8], width: usize) -> Result<u64> {
    debug_assert!(width == 4 || width == 8, "number width must be 4 or 8");
    take(cursor, width).map(be_uint)
}

/// Read a 1 or 2 byte big-endian number (key-text length prefixes).
pub fn read_small_number(cursor: &mut &[u8], width: usize) -> Result<u64> {
    debug_assert!(width == 1 || width == 2, "small number width must be 1 or 2");
    take(cursor, width).map(be_uint)
}
