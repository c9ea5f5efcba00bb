//! Compressed block decoding.
//!
//! Every key block, record block and (v2) key-info table starts with a
//! 4-byte compression tag followed by a 4-byte big-endian Adler32 of the
//! *decompressed* payload. Byte 0 of the tag selects the algorithm:
//! `00` raw, `01` LZO1X, `02` zlib.

use std::io::Read;

use adler32::adler32;
use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use log::trace;
use lzokay::decompress::decompress as lzo1x_decompress;

use super::error::{MdictError, Result};
use super::models::CompressionType;

fn corrupt(block: usize, reason: String) -> MdictError {
    MdictError::CorruptBlock { block, reason }
}

/// Decode one tagged block: dispatch on the compression tag, expand to
/// `expected_len` bytes and verify the stored checksum.
///
/// `block` is the caller's block index, carried into errors so corrupt
/// blocks can be pinpointed in multi-gigabyte files.
pub fn decode_block(block: usize, raw: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    if raw.len() < 8 {
        return Err(corrupt(
            block,
            format!("block too short: {} bytes, tag needs 8", raw.len()),
        ));
    }

    let tag = CompressionType::try_from(raw[0])
        .map_err(|_| corrupt(block, format!("unknown compression tag {:#04x}", raw[0])))?;
    let stored_checksum = BigEndian::read_u32(&raw[4..8]);
    let payload = &raw[8..];

    trace!(
        "decoding block {}: tag={:?}, {} compressed bytes, {} expected",
        block,
        tag,
        payload.len(),
        expected_len
    );

    let decompressed = match tag {
        CompressionType::None => payload.to_vec(),
        CompressionType::Lzo => {
            let mut out = vec![0u8; expected_len as usize];
            lzo1x_decompress(payload, &mut out)
                .map_err(|e| corrupt(block, format!("lzo1x decompression failed: {:?}", e)))?;
            out
        }
        CompressionType::Zlib => {
            let mut out = Vec::with_capacity(expected_len as usize);
            ZlibDecoder::new(payload)
                .read_to_end(&mut out)
                .map_err(|e| corrupt(block, format!("zlib inflation failed: {}", e)))?;
            out
        }
    };

    if decompressed.len() as u64 != expected_len {
        return Err(corrupt(
            block,
            format!(
                "decompressed size mismatch: expected {}, got {}",
                expected_len,
                decompressed.len()
            ),
        ));
    }

    let actual_checksum = adler32(decompressed.as_slice())?;
    if actual_checksum != stored_checksum {
        return Err(corrupt(
            block,
            format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored_checksum, actual_checksum
            ),
        ));
    }

    Ok(decompressed)
}
