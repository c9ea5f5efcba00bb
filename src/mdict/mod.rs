//! Core MDict reader module.

pub mod error;
pub mod models;

mod compression;
mod crypto;
mod header;
mod iter;
mod key_index;
mod mdd;
mod mdx;
mod reader;
mod record_index;
mod utils;

use std::path::{Path, PathBuf};

use log::info;

pub use error::{MdictError, Result};
pub use iter::Keys;
pub use mdd::Mdd;
pub use mdx::Mdx;
pub use models::{
    DictParams, EncryptionFlags, Format, KeyBlockInfoEntry, KeyEntry, RecordBlockInfoEntry,
    ResourceEncoding, Version,
};

use key_index::{KeyIndex, RawKeyEntry};
use reader::BinReader;
use record_index::RecordIndex;

/// A handle on an MDX or MDD file.
///
/// Constructed from a path; `init()` populates all indexes in a single
/// forward pass over the file. Afterwards the instance is read-only and
/// safe to share across threads: lookups decompress blocks on demand
/// through bounds-checked positional reads.
///
/// [`Mdx`] and [`Mdd`] wrap this type with format-specific result handling;
/// most callers want one of those.
pub struct Mdict {
    path: PathBuf,
    reader: BinReader,
    format: Format,
    passcode: Option<String>,
    state: Option<DictState>,
}

struct DictState {
    params: DictParams,
    key_index: KeyIndex,
    record_index: RecordIndex,
}

/// A located key: where its value starts in the decompressed record stream
/// and where the following value begins.
struct FoundEntry {
    record_offset: u64,
    next_offset: u64,
}

impl Mdict {
    /// Open a dictionary file. The format is fixed by the suffix: `.mdd`
    /// means binary resources, anything else is an MDX text dictionary.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), None)
    }

    /// Open a dictionary file, keeping a passcode for encrypted files.
    ///
    /// Record-block encryption itself is unsupported; the passcode is held
    /// so the derivation can be added without an API break.
    pub fn with_passcode(path: impl AsRef<Path>, passcode: &str) -> Result<Self> {
        Self::open_with(path.as_ref(), Some(passcode.to_string()))
    }

    fn open_with(path: &Path, passcode: Option<String>) -> Result<Self> {
        let format = if path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("mdd"))
        {
            Format::Mdd
        } else {
            Format::Mdx
        };
        Ok(Mdict {
            reader: BinReader::open(path)?,
            path: path.to_path_buf(),
            format,
            passcode,
            state: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Parse the header, key index and record index, validating checksums,
    /// size totals and ordering invariants. Fails fast on a structurally
    /// invalid file; per-block corruption surfaces later from the call that
    /// touches the block.
    pub fn init(&mut self) -> Result<()> {
        let parsed = header::parse(&self.reader, self.format, self.passcode.clone())?;
        let key_index = key_index::parse(&self.reader, &parsed.params, parsed.key_section_start)?;

        let record_section = key_index.body_start + key_index.header.key_block_size;
        let record_index = record_index::parse(
            &self.reader,
            &parsed.params,
            record_section,
            key_index.header.entries_num,
        )?;

        info!(
            "dictionary ready: {} ({} entries, {} key blocks, {} record blocks)",
            self.path.display(),
            key_index.header.entries_num,
            key_index.blocks.len(),
            record_index.blocks.len()
        );

        self.state = Some(DictState {
            params: parsed.params,
            key_index,
            record_index,
        });
        Ok(())
    }

    fn state(&self) -> Result<&DictState> {
        self.state.as_ref().ok_or(MdictError::NotInitialized)
    }

    /// Negotiated parameters; available after `init()`.
    pub fn params(&self) -> Result<&DictParams> {
        Ok(&self.state()?.params)
    }

    /// Total number of key entries.
    pub fn entry_count(&self) -> Result<u64> {
        Ok(self.state()?.key_index.header.entries_num)
    }

    /// The ordered key-block-info table.
    pub fn key_blocks(&self) -> Result<&[KeyBlockInfoEntry]> {
        Ok(&self.state()?.key_index.blocks)
    }

    /// The ordered record-block-info table.
    pub fn record_blocks(&self) -> Result<&[RecordBlockInfoEntry]> {
        Ok(&self.state()?.record_index.blocks)
    }

    /// Whether `word` exists, by the same two-level search as `fetch` but
    /// without touching any record block.
    pub fn contains(&self, word: &str) -> Result<bool> {
        Ok(self.find_entry(word)?.is_some())
    }

    /// Exact-match lookup returning the verbatim value bytes.
    ///
    /// For MDX these are the encoded definition text; for MDD the raw
    /// resource. Comparison is a case-sensitive byte compare in the raw
    /// dictionary encoding.
    pub fn fetch(&self, word: &str) -> Result<Vec<u8>> {
        let state = self.state()?;
        let found = self.find_entry(word)?.ok_or(MdictError::NotFound)?;

        if state.params.encryption.record_blocks {
            return Err(MdictError::UnsupportedEncryption);
        }

        let block = state
            .record_index
            .find_block_by_offset(found.record_offset)
            .ok_or_else(|| {
                MdictError::CorruptFormat(format!(
                    "record offset {} is beyond the record stream",
                    found.record_offset
                ))
            })?;
        let meta = state.record_index.blocks[block];
        let data = state.record_index.read_block(&self.reader, block)?;

        // The value runs to the next entry's offset, clamped to this
        // block's end (the next entry may open the following block).
        let block_end = meta.decompressed_accumulator + meta.decompressed_size;
        let start = (found.record_offset - meta.decompressed_accumulator) as usize;
        let end = (found.next_offset.min(block_end) - meta.decompressed_accumulator) as usize;
        if start > end || end > data.len() {
            return Err(MdictError::CorruptBlock {
                block,
                reason: format!(
                    "record slice {}..{} outside decompressed block of {} bytes",
                    start,
                    end,
                    data.len()
                ),
            });
        }

        Ok(data[start..end].to_vec())
    }

    /// Keys starting with `prefix`, in file order.
    ///
    /// Walks only the key blocks whose `[first_key, last_key]` range can
    /// contain the prefix, decompressing each at most once.
    pub fn suggest(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        let target = state.params.encode_text(prefix);
        let blocks = &state.key_index.blocks;

        let mut matches = Vec::new();
        let start = blocks.partition_point(|b| b.last_key_raw.as_slice() < target.as_slice());
        for index in start..blocks.len() {
            let first = blocks[index].first_key_raw.as_slice();
            // Once a block opens past the prefix range, no later block can
            // hold a match.
            if first > target.as_slice() && !first.starts_with(&target) {
                break;
            }
            for entry in self.load_key_block(index)? {
                if entry.key.starts_with(&target) {
                    matches.push(state.params.decode_text(&entry.key));
                }
            }
        }
        Ok(matches)
    }

    /// Lazy iterator over all key entries in file order, decompressing one
    /// key block at a time. Each call starts a fresh pass.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    /// Binary-search the key-block-info table, decompress the candidate
    /// block and scan it for an exact match.
    fn find_entry(&self, word: &str) -> Result<Option<FoundEntry>> {
        let state = self.state()?;
        let target = state.params.encode_text(word);

        let Some(block) = state.key_index.find_block(&target) else {
            return Ok(None);
        };
        let entries = self.load_key_block(block)?;
        let Some(position) = entries.iter().position(|e| e.key == target) else {
            return Ok(None);
        };

        let record_offset = entries[position].record_offset;
        let next_offset = if position + 1 < entries.len() {
            entries[position + 1].record_offset
        } else if block + 1 < state.key_index.blocks.len() {
            self.load_key_block(block + 1)?
                .first()
                .map(|e| e.record_offset)
                .unwrap_or(state.record_index.total_decompressed_size)
        } else {
            state.record_index.total_decompressed_size
        };

        Ok(Some(FoundEntry {
            record_offset,
            next_offset,
        }))
    }

    /// Decompress and parse one key block, cross-checking the entry count
    /// declared by the info table.
    fn load_key_block(&self, index: usize) -> Result<Vec<RawKeyEntry>> {
        let state = self.state()?;
        let data = state.key_index.read_block(&self.reader, index)?;
        let entries = key_index::parse_block_entries(&data, &state.params, index)?;

        let declared = state.key_index.blocks[index].entries;
        if entries.len() as u64 != declared {
            return Err(MdictError::CorruptBlock {
                block: index,
                reason: format!("declared {} entries, parsed {}", declared, entries.len()),
            });
        }
        Ok(entries)
    }
}
