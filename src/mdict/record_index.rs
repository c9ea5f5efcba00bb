//! Record index: record-block header and info table.
//!
//! The record section follows the key blocks: four `number_width` counts
//! (`record_block_num`, `record_entries_num`, `record_block_info_size`,
//! `record_block_size`), then the info table of per-block size pairs, then
//! the record block bodies.

use log::{debug, info};

use super::compression;
use super::error::{MdictError, Result};
use super::models::{DictParams, RecordBlockInfoEntry};
use super::reader::BinReader;
use super::utils::read_number;

#[derive(Debug)]
pub struct RecordIndex {
    pub record_block_num: u64,
    pub entries_num: u64,
    pub blocks: Vec<RecordBlockInfoEntry>,
    /// File offset of the first record block body.
    pub body_start: u64,
    /// Size of the whole decompressed record stream; the end bound of the
    /// final entry's value.
    pub total_decompressed_size: u64,
}

impl RecordIndex {
    /// Index of the block whose decompressed range contains `offset`.
    pub fn find_block_by_offset(&self, offset: u64) -> Option<usize> {
        let idx = self
            .blocks
            .partition_point(|b| b.decompressed_accumulator <= offset);
        if idx == 0 {
            return None;
        }
        let block = &self.blocks[idx - 1];
        (offset < block.decompressed_accumulator + block.decompressed_size).then_some(idx - 1)
    }

    /// Read and decompress the record block at `index`.
    pub fn read_block(&self, reader: &BinReader, index: usize) -> Result<Vec<u8>> {
        let meta = &self.blocks[index];
        let raw = reader.read_at(
            self.body_start + meta.compressed_accumulator,
            meta.compressed_size,
        )?;
        compression::decode_block(index, &raw, meta.decompressed_size)
    }
}

/// Parse the record section header and info table at `offset`, checking the
/// entry-count cross-reference against the key index and the size totals.
pub fn parse(
    reader: &BinReader,
    params: &DictParams,
    offset: u64,
    key_entries_num: u64,
) -> Result<RecordIndex> {
    let width = params.number_width();

    let header = reader.read_at(offset, 4 * width as u64)?;
    let mut cursor = &header[..];
    let record_block_num = read_number(&mut cursor, width)?;
    let entries_num = read_number(&mut cursor, width)?;
    let record_block_info_size = read_number(&mut cursor, width)?;
    let record_block_size = read_number(&mut cursor, width)?;

    if entries_num != key_entries_num {
        return Err(MdictError::CorruptFormat(format!(
            "record section declares {} entries, key index holds {}",
            entries_num, key_entries_num
        )));
    }

    debug!(
        "record block header: {} blocks, {} entries, info {} bytes, bodies {} bytes",
        record_block_num, entries_num, record_block_info_size, record_block_size
    );

    let table = reader.read_at(offset + 4 * width as u64, record_block_info_size)?;
    let mut cursor = &table[..];
    // Capacity bounded by the table itself; a forged block count fails on
    // its first read instead of a huge allocation.
    let mut blocks = Vec::with_capacity((record_block_num as usize).min(table.len()));
    let mut compressed_accumulator = 0u64;
    let mut decompressed_accumulator = 0u64;

    for _ in 0..record_block_num {
        let compressed_size = read_number(&mut cursor, width)?;
        let decompressed_size = read_number(&mut cursor, width)?;
        blocks.push(RecordBlockInfoEntry {
            compressed_size,
            compressed_accumulator,
            decompressed_size,
            decompressed_accumulator,
        });
        compressed_accumulator += compressed_size;
        decompressed_accumulator += decompressed_size;
    }

    if !cursor.is_empty() {
        return Err(MdictError::CorruptFormat(format!(
            "{} trailing bytes after the record block info table",
            cursor.len()
        )));
    }
    if compressed_accumulator != record_block_size {
        return Err(MdictError::CorruptFormat(format!(
            "record block sizes sum to {}, header declares {}",
            compressed_accumulator, record_block_size
        )));
    }

    info!(
        "record index built: {} blocks, {} decompressed bytes",
        blocks.len(),
        decompressed_accumulator
    );

    Ok(RecordIndex {
        record_block_num,
        entries_num,
        blocks,
        body_start: offset + 4 * width as u64 + record_block_info_size,
        total_decompressed_size: decompressed_accumulator,
    })
}
