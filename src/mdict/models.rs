//! Data structures representing MDict format components.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use super::error::{MdictError, Result};

/// Dictionary flavour, fixed by the file suffix.
///
/// MDX files carry textual definitions; MDD files carry binary resources
/// keyed by UTF-16LE path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Mdx,
    Mdd,
}

/// Engine format generation, negotiated from `GeneratedByEngineVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    /// Width in bytes of the big-endian integers used for counts and sizes.
    pub fn number_width(&self) -> usize {
        match self {
            Version::V1 => 4,
            Version::V2 => 8,
        }
    }

    /// Width in bytes of the key-text length prefixes in the key-block-info
    /// table.
    pub fn small_number_width(&self) -> usize {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }

    /// Total on-disk length of the key-block header, including the trailing
    /// checksum word that only v2 carries.
    pub fn key_header_len(&self) -> usize {
        match self {
            Version::V1 => 16,
            Version::V2 => 44,
        }
    }
}

impl TryFrom<f32> for Version {
    type Error = MdictError;

    fn try_from(v: f32) -> Result<Self> {
        if v < 2.0 {
            Ok(Version::V1)
        } else if v < 3.0 {
            Ok(Version::V2)
        } else {
            Err(MdictError::UnsupportedVersion(v))
        }
    }
}

/// Encryption flags from the header's `Encrypted` bitmask.
///
/// Bit 0x01: record blocks are encrypted (unsupported, fails on use).
/// Bit 0x02: the key-block-info table is encrypted.
#[derive(Debug, Default, Clone, Copy)]
pub struct EncryptionFlags {
    pub record_blocks: bool,
    pub key_info: bool,
}

/// Negotiated dictionary parameters, immutable after `init()`.
#[derive(Debug)]
pub struct DictParams {
    pub version: Version,
    pub engine_version: f32,
    pub encoding: &'static Encoding,
    pub encryption: EncryptionFlags,
    pub format: Format,
    pub passcode: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub stylesheet: Option<String>,
}

impl DictParams {
    pub fn number_width(&self) -> usize {
        self.version.number_width()
    }

    /// Width in bytes of one character unit of key text: 2 for UTF-16 and
    /// for MDD files (which key resources by UTF-16LE path), 1 otherwise.
    pub fn char_width(&self) -> usize {
        if self.format == Format::Mdd || self.encoding == UTF_16LE || self.encoding == UTF_16BE {
            2
        } else {
            1
        }
    }

    /// Decode raw bytes in the dictionary encoding.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Encode text into the dictionary encoding for raw-byte key comparison.
    ///
    /// `encoding_rs` encoders fall back to UTF-8 output for the UTF-16
    /// encodings, so those are serialized by hand.
    pub fn encode_text(&self, text: &str) -> Vec<u8> {
        if self.encoding == UTF_16LE {
            text.encode_utf16().flat_map(u16::to_le_bytes).collect()
        } else if self.encoding == UTF_16BE {
            text.encode_utf16().flat_map(u16::to_be_bytes).collect()
        } else if self.encoding == UTF_8 {
            text.as_bytes().to_vec()
        } else {
            let (bytes, _, _) = self.encoding.encode(text);
            bytes.into_owned()
        }
    }
}

/// Block compression algorithm, selected by byte 0 of the compression tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Lzo,
    Zlib,
}

impl TryFrom<u8> for CompressionType {
    type Error = MdictError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lzo),
            2 => Ok(CompressionType::Zlib),
            _ => Err(MdictError::CorruptFormat(format!(
                "unknown compression tag: {:#04x}",
                value
            ))),
        }
    }
}

/// One entry of the key-block-info table, describing a single key block.
///
/// The accumulators are prefix sums over all preceding entries, so a block's
/// file offset and decompressed stream position follow in O(1).
#[derive(Debug, Clone)]
pub struct KeyBlockInfoEntry {
    /// First key of the block, decoded for display.
    pub first_key: String,
    /// Last key of the block, decoded for display.
    pub last_key: String,
    /// First key in the raw dictionary encoding; all collation is
    /// byte-lexicographic on this form.
    pub first_key_raw: Vec<u8>,
    /// Last key in the raw dictionary encoding.
    pub last_key_raw: Vec<u8>,
    /// Number of key entries in this block.
    pub entries: u64,
    /// Sum of `entries` over all preceding blocks.
    pub entries_accumulator: u64,
    /// On-disk (compressed) size of the block.
    pub compressed_size: u64,
    pub compressed_accumulator: u64,
    /// Size of the block once expanded.
    pub decompressed_size: u64,
    pub decompressed_accumulator: u64,
}

/// A dictionary key with the offset of its value in the concatenated
/// decompressed record stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub record_offset: u64,
    pub key_text: String,
}

/// One entry of the record-block-info table.
#[derive(Debug, Clone, Copy)]
pub struct RecordBlockInfoEntry {
    pub compressed_size: u64,
    pub compressed_accumulator: u64,
    pub decompressed_size: u64,
    pub decompressed_accumulator: u64,
}

/// Output encoding for `Mdd::locate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEncoding {
    Base64,
    Hex,
}
