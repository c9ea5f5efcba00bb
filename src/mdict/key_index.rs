//! Key index: key-block header, key-block-info table and key block bodies.
//!
//! The key section is laid out as:
//! - key-block header (v2: five `u64_be` + Adler32 over those 40 bytes;
//!   v1: four `u32_be`, no checksum, no decompressed-size field)
//! - key-block-info table (`key_block_info_size` bytes; v2: tagged,
//!   optionally encrypted, compressed; v1: stored raw)
//! - key block bodies (`key_block_size` bytes of tagged blocks)

use adler32::adler32;
use log::{debug, info};

use super::compression;
use super::crypto;
use super::error::{MdictError, Result};
use super::models::{DictParams, KeyBlockInfoEntry, Version};
use super::reader::BinReader;
use super::utils::{be_uint, read_number, read_small_number, take};

/// Counts and sizes from the key-block header.
#[derive(Debug)]
pub struct KeyBlockHeader {
    pub key_block_num: u64,
    pub entries_num: u64,
    pub key_block_info_decompressed_size: u64,
    pub key_block_info_size: u64,
    pub key_block_size: u64,
}

/// The parsed key index: ordered per-block metadata plus the file offset of
/// the first key block body.
#[derive(Debug)]
pub struct KeyIndex {
    pub header: KeyBlockHeader,
    pub blocks: Vec<KeyBlockInfoEntry>,
    pub body_start: u64,
}

/// One `(record_offset, key)` pair in the raw dictionary encoding, as
/// parsed out of a decompressed key block.
#[derive(Debug, Clone)]
pub struct RawKeyEntry {
    pub record_offset: u64,
    pub key: Vec<u8>,
}

impl KeyIndex {
    /// Index of the block that would hold `word` (raw-encoded), i.e. the
    /// first block whose last key is not below it. `None` when the word
    /// sorts past every block.
    pub fn find_block(&self, word: &[u8]) -> Option<usize> {
        let idx = self
            .blocks
            .partition_point(|b| b.last_key_raw.as_slice() < word);
        (idx < self.blocks.len()).then_some(idx)
    }

    /// Read and decompress the key block at `index`.
    pub fn read_block(&self, reader: &BinReader, index: usize) -> Result<Vec<u8>> {
        let meta = &self.blocks[index];
        let raw = reader.read_at(
            self.body_start + meta.compressed_accumulator,
            meta.compressed_size,
        )?;
        compression::decode_block(index, &raw, meta.decompressed_size)
    }
}

/// Parse the key-block header and info table starting at
/// `key_section_start`, building accumulators in a single pass and
/// validating the size, count and ordering invariants.
pub fn parse(reader: &BinReader, params: &DictParams, key_section_start: u64) -> Result<KeyIndex> {
    let header = parse_header(reader, params, key_section_start)?;
    debug!(
        "key block header: {} blocks, {} entries, info {} bytes, bodies {} bytes",
        header.key_block_num,
        header.entries_num,
        header.key_block_info_size,
        header.key_block_size
    );

    let info_start = key_section_start + params.version.key_header_len() as u64;
    let table = read_info_table(reader, params, &header, info_start)?;
    let blocks = parse_info_entries(&table, params, &header)?;

    info!(
        "key index built: {} blocks, {} entries",
        blocks.len(),
        header.entries_num
    );

    Ok(KeyIndex {
        body_start: info_start + header.key_block_info_size,
        header,
        blocks,
    })
}

fn parse_header(
    reader: &BinReader,
    params: &DictParams,
    offset: u64,
) -> Result<KeyBlockHeader> {
    let buf = reader.read_at(offset, params.version.key_header_len() as u64)?;
    let width = params.number_width();
    let mut cursor = &buf[..];

    let key_block_num = read_number(&mut cursor, width)?;
    let entries_num = read_number(&mut cursor, width)?;

    let key_block_info_decompressed_size = match params.version {
        Version::V2 => read_number(&mut cursor, width)?,
        // v1 stores the info table raw, so its expanded size is its size.
        Version::V1 => 0,
    };
    let key_block_info_size = read_number(&mut cursor, width)?;
    let key_block_size = read_number(&mut cursor, width)?;

    if params.version == Version::V2 {
        let stored = be_uint(&buf[40..44]) as u32;
        let actual = adler32(&buf[..40])?;
        if actual != stored {
            return Err(MdictError::CorruptFormat(format!(
                "key block header checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored, actual
            )));
        }
    }

    Ok(KeyBlockHeader {
        key_block_num,
        entries_num,
        key_block_info_decompressed_size: match params.version {
            Version::V2 => key_block_info_decompressed_size,
            Version::V1 => key_block_info_size,
        },
        key_block_info_size,
        key_block_size,
    })
}

/// Read the key-block-info table and expand it to its plain form.
fn read_info_table(
    reader: &BinReader,
    params: &DictParams,
    header: &KeyBlockHeader,
    info_start: u64,
) -> Result<Vec<u8>> {
    let mut raw = reader.read_at(info_start, header.key_block_info_size)?;

    match params.version {
        // v1 info tables are stored raw, with no tag and no compression.
        Version::V1 => Ok(raw),
        Version::V2 => {
            if params.encryption.key_info {
                crypto::decrypt_key_info(&mut raw);
            }
            compression::decode_block(0, &raw, header.key_block_info_decompressed_size).map_err(
                // An unreadable info table is a structural failure of init,
                // not a lazily-surfaced block error.
                |e| match e {
                    MdictError::CorruptBlock { reason, .. } => {
                        MdictError::CorruptFormat(format!("key block info table: {}", reason))
                    }
                    other => other,
                },
            )
        }
    }
}

/// Parse `key_block_num` info entries, each:
/// - entry count (`number_width` bytes)
/// - first key: length prefix in characters (`u16_be` v2 / `u8` v1), then
///   `(len + 1) * char_width` bytes including a NUL for v2, or
///   `len * char_width` bytes with no terminator for v1
/// - last key: same rule
/// - compressed and decompressed block sizes (`number_width` each)
fn parse_info_entries(
    table: &[u8],
    params: &DictParams,
    header: &KeyBlockHeader,
) -> Result<Vec<KeyBlockInfoEntry>> {
    let width = params.number_width();
    let small_width = params.version.small_number_width();
    let char_width = params.char_width();
    let terminated = params.version == Version::V2;

    // Capacity bounded by the table itself; a forged block count fails on
    // its first read instead of a huge allocation.
    let mut blocks: Vec<KeyBlockInfoEntry> =
        Vec::with_capacity((header.key_block_num as usize).min(table.len()));
    let mut cursor = table;
    let mut compressed_accumulator = 0u64;
    let mut decompressed_accumulator = 0u64;
    let mut entries_accumulator = 0u64;

    for index in 0..header.key_block_num {
        let entries = read_number(&mut cursor, width)?;
        let first_key_raw = read_boundary_key(&mut cursor, small_width, char_width, terminated)?;
        let last_key_raw = read_boundary_key(&mut cursor, small_width, char_width, terminated)?;
        let compressed_size = read_number(&mut cursor, width)?;
        let decompressed_size = read_number(&mut cursor, width)?;

        if let Some(prev) = blocks.last() {
            if first_key_raw < prev.last_key_raw {
                return Err(MdictError::CorruptFormat(format!(
                    "key blocks out of order: block {} starts below the last key of block {}",
                    index,
                    index - 1
                )));
            }
        }

        blocks.push(KeyBlockInfoEntry {
            first_key: params.decode_text(&first_key_raw),
            last_key: params.decode_text(&last_key_raw),
            first_key_raw,
            last_key_raw,
            entries,
            entries_accumulator,
            compressed_size,
            compressed_accumulator,
            decompressed_size,
            decompressed_accumulator,
        });

        compressed_accumulator += compressed_size;
        decompressed_accumulator += decompressed_size;
        entries_accumulator += entries;
    }

    if !cursor.is_empty() {
        return Err(MdictError::CorruptFormat(format!(
            "{} trailing bytes after the key block info table",
            cursor.len()
        )));
    }
    if compressed_accumulator != header.key_block_size {
        return Err(MdictError::CorruptFormat(format!(
            "key block sizes sum to {}, header declares {}",
            compressed_accumulator, header.key_block_size
        )));
    }
    if entries_accumulator != header.entries_num {
        return Err(MdictError::CorruptFormat(format!(
            "key block entry counts sum to {}, header declares {}",
            entries_accumulator, header.entries_num
        )));
    }

    Ok(blocks)
}

/// Read one length-prefixed boundary key, returning it without the v2 NUL.
fn read_boundary_key(
    cursor: &mut &[u8],
    small_width: usize,
    char_width: usize,
    terminated: bool,
) -> Result<Vec<u8>> {
    let units = read_small_number(cursor, small_width)? as usize;
    let stored = if terminated {
        (units + 1) * char_width
    } else {
        units * char_width
    };
    let bytes = take(cursor, stored)?;
    let keep = if terminated {
        bytes.len() - char_width
    } else {
        bytes.len()
    };
    Ok(bytes[..keep].to_vec())
}

/// Parse the entries of one decompressed key block. Each entry is a
/// `number_width` record offset followed by key text up to a NUL of
/// `char_width` bytes. Record offsets must be non-decreasing.
pub fn parse_block_entries(
    data: &[u8],
    params: &DictParams,
    block: usize,
) -> Result<Vec<RawKeyEntry>> {
    let width = params.number_width();
    let char_width = params.char_width();

    let mut entries = Vec::new();
    let mut cursor = data;
    let mut previous_offset = 0u64;

    while !cursor.is_empty() {
        let record_offset = read_number(&mut cursor, width).map_err(|_| {
            MdictError::CorruptBlock {
                block,
                reason: "key entry truncated before its record offset".to_string(),
            }
        })?;

        if record_offset < previous_offset {
            return Err(MdictError::CorruptFormat(format!(
                "record offsets decrease within key block {}",
                block
            )));
        }
        previous_offset = record_offset;

        // Scan for the terminator in whole character units; a bytewise scan
        // would match the low byte of one UTF-16 unit against the high byte
        // of the next.
        let pos = cursor
            .chunks_exact(char_width)
            .position(|unit| unit.iter().all(|&b| b == 0))
            .ok_or_else(|| MdictError::CorruptBlock {
                block,
                reason: "unterminated key text".to_string(),
            })?;

        entries.push(RawKeyEntry {
            record_offset,
            key: cursor[..pos * char_width].to_vec(),
        });
        cursor = &cursor[(pos + 1) * char_width..];
    }

    Ok(entries)
}
