//! In-memory builder for bit-exact MDX/MDD fixture images.
//!
//! Mirrors the writer side of the on-disk layout: UTF-16LE XML header with
//! little-endian Adler32, key-block header (v2 checksummed), key-block-info
//! table (v2 tagged/compressed/optionally ciphered, v1 raw), tagged key and
//! record blocks with big-endian Adler32 words over the plain payloads.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use adler32::adler32;
use encoding_rs::GB18030;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ripemd::{Digest, Ripemd128};

pub const RAW_TAG: u8 = 0;
pub const ZLIB_TAG: u8 = 2;

#[derive(Clone, Copy, PartialEq)]
enum Codec {
    Utf8,
    Gb18030,
    Utf16Le,
}

enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

pub struct FixtureBuilder {
    version: &'static str,
    encoding_attr: &'static str,
    encrypted_attr: &'static str,
    mdd: bool,
    tag: u8,
    keys_per_block: usize,
    records_per_block: usize,
    entries: Vec<(String, Payload)>,
}

/// A finished fixture image plus the offsets tamper tests need.
pub struct Fixture {
    pub bytes: Vec<u8>,
    /// Offset of the key-block header (end of the XML header section).
    pub key_header_offset: usize,
    /// Offset of the first key block body.
    pub key_body_offset: usize,
}

impl FixtureBuilder {
    pub fn mdx(version: &'static str) -> Self {
        FixtureBuilder {
            version,
            encoding_attr: "",
            encrypted_attr: "",
            mdd: false,
            tag: ZLIB_TAG,
            keys_per_block: 2,
            records_per_block: 2,
            entries: Vec::new(),
        }
    }

    pub fn mdd(version: &'static str) -> Self {
        FixtureBuilder {
            mdd: true,
            ..Self::mdx(version)
        }
    }

    pub fn encoding(mut self, attr: &'static str) -> Self {
        self.encoding_attr = attr;
        self
    }

    pub fn encrypted(mut self, attr: &'static str) -> Self {
        self.encrypted_attr = attr;
        self
    }

    pub fn tag(mut self, tag: u8) -> Self {
        self.tag = tag;
        self
    }

    pub fn blocking(mut self, keys_per_block: usize, records_per_block: usize) -> Self {
        self.keys_per_block = keys_per_block;
        self.records_per_block = records_per_block;
        self
    }

    pub fn word(mut self, key: &str, definition: &str) -> Self {
        self.entries
            .push((key.to_string(), Payload::Text(definition.to_string())));
        self
    }

    pub fn resource(mut self, key: &str, bytes: &[u8]) -> Self {
        self.entries
            .push((key.to_string(), Payload::Bytes(bytes.to_vec())));
        self
    }

    fn codec(&self) -> Codec {
        if self.mdd {
            return Codec::Utf16Le;
        }
        match self.encoding_attr {
            "UTF-16" | "utf-16" | "utf16" => Codec::Utf16Le,
            "GBK" | "GB2312" | "GB18030" => Codec::Gb18030,
            _ => Codec::Utf8,
        }
    }

    fn is_v2(&self) -> bool {
        self.version.starts_with('2')
    }

    fn width(&self) -> usize {
        if self.is_v2() {
            8
        } else {
            4
        }
    }

    fn char_width(&self) -> usize {
        if self.codec() == Codec::Utf16Le {
            2
        } else {
            1
        }
    }

    pub fn build(&self) -> Fixture {
        let codec = self.codec();
        let width = self.width();
        let char_width = self.char_width();

        // Encode and byte-sort the entries; the format stores keys in
        // raw-encoding order.
        let mut encoded: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .iter()
            .map(|(key, payload)| {
                let value = match payload {
                    // MDX definitions carry a trailing NUL in the record
                    // stream.
                    Payload::Text(text) => {
                        let mut v = encode_text(codec, text);
                        v.extend(std::iter::repeat(0u8).take(char_width));
                        v
                    }
                    Payload::Bytes(bytes) => bytes.clone(),
                };
                (encode_text(codec, key), value)
            })
            .collect();
        encoded.sort_by(|a, b| a.0.cmp(&b.0));

        // Global offsets into the concatenated decompressed record stream.
        let mut offsets = Vec::with_capacity(encoded.len());
        let mut cursor = 0u64;
        for (_, value) in &encoded {
            offsets.push(cursor);
            cursor += value.len() as u64;
        }

        // Key blocks.
        let mut index = 0usize;
        let mut key_block_meta = Vec::new();
        while index < encoded.len() {
            let end = (index + self.keys_per_block).min(encoded.len());
            let mut plain = Vec::new();
            for i in index..end {
                plain.extend_from_slice(&be_num(offsets[i], width));
                plain.extend_from_slice(&encoded[i].0);
                plain.extend(std::iter::repeat(0u8).take(char_width));
            }
            let packed = pack_block(self.tag, &plain);
            key_block_meta.push(KeyBlockMeta {
                packed,
                plain_len: plain.len() as u64,
                count: (end - index) as u64,
                first: encoded[index].0.clone(),
                last: encoded[end - 1].0.clone(),
            });
            index = end;
        }

        // Key-block-info table.
        let mut info = Vec::new();
        for meta in &key_block_meta {
            info.extend_from_slice(&be_num(meta.count, width));
            push_boundary_key(&mut info, &meta.first, char_width, self.is_v2());
            push_boundary_key(&mut info, &meta.last, char_width, self.is_v2());
            info.extend_from_slice(&be_num(meta.packed.len() as u64, width));
            info.extend_from_slice(&be_num(meta.plain_len, width));
        }
        let info_plain_len = info.len() as u64;
        let info_stored = if self.is_v2() {
            let mut packed = pack_block(self.tag, &info);
            if self.encrypted_attr == "2" || self.encrypted_attr == "3" {
                cipher_key_info(&mut packed);
            }
            packed
        } else {
            info
        };

        let key_blocks_len: u64 = key_block_meta.iter().map(|m| m.packed.len() as u64).sum();

        // Key-block header.
        let mut key_header = Vec::new();
        key_header.extend_from_slice(&be_num(key_block_meta.len() as u64, width));
        key_header.extend_from_slice(&be_num(encoded.len() as u64, width));
        if self.is_v2() {
            key_header.extend_from_slice(&be_num(info_plain_len, width));
        }
        key_header.extend_from_slice(&be_num(info_stored.len() as u64, width));
        key_header.extend_from_slice(&be_num(key_blocks_len, width));
        if self.is_v2() {
            let checksum = adler32(&key_header[..]).unwrap();
            key_header.extend_from_slice(&checksum.to_be_bytes());
        }

        // Record blocks.
        let mut record_blocks = Vec::new(); // (packed, plain_len)
        let mut index = 0usize;
        while index < encoded.len() {
            let end = (index + self.records_per_block).min(encoded.len());
            let mut plain = Vec::new();
            for (_, value) in &encoded[index..end] {
                plain.extend_from_slice(value);
            }
            let packed = pack_block(self.tag, &plain);
            record_blocks.push((packed, plain.len() as u64));
            index = end;
        }

        let record_blocks_len: u64 = record_blocks.iter().map(|(p, _)| p.len() as u64).sum();
        let mut record_section = Vec::new();
        record_section.extend_from_slice(&be_num(record_blocks.len() as u64, width));
        record_section.extend_from_slice(&be_num(encoded.len() as u64, width));
        record_section.extend_from_slice(&be_num((2 * width * record_blocks.len()) as u64, width));
        record_section.extend_from_slice(&be_num(record_blocks_len, width));
        for (packed, plain_len) in &record_blocks {
            record_section.extend_from_slice(&be_num(packed.len() as u64, width));
            record_section.extend_from_slice(&be_num(*plain_len, width));
        }
        for (packed, _) in &record_blocks {
            record_section.extend_from_slice(packed);
        }

        // XML header.
        let format_attr = if self.mdd { "MDD" } else { "MDX" };
        let xml = format!(
            r#"<Dictionary GeneratedByEngineVersion="{}" Encrypted="{}" Encoding="{}" Format="{}" Title="Fixture Dictionary"/>"#,
            self.version, self.encrypted_attr, self.encoding_attr, format_attr
        );
        let xml_bytes: Vec<u8> = xml.encode_utf16().flat_map(u16::to_le_bytes).collect();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(xml_bytes.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&xml_bytes);
        bytes.extend_from_slice(&adler32(&xml_bytes[..]).unwrap().to_le_bytes());

        let key_header_offset = bytes.len();
        bytes.extend_from_slice(&key_header);
        bytes.extend_from_slice(&info_stored);
        let key_body_offset = bytes.len();
        for meta in &key_block_meta {
            bytes.extend_from_slice(&meta.packed);
        }
        bytes.extend_from_slice(&record_section);

        Fixture {
            bytes,
            key_header_offset,
            key_body_offset,
        }
    }
}

struct KeyBlockMeta {
    packed: Vec<u8>,
    plain_len: u64,
    count: u64,
    first: Vec<u8>,
    last: Vec<u8>,
}

impl Fixture {
    /// Write the image to a uniquely named temp file; `name` supplies the
    /// suffix that fixes the format.
    pub fn write(&self, name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mdx-dict-{}-{}", std::process::id(), name));
        fs::write(&path, &self.bytes).expect("write fixture");
        path
    }
}

fn encode_text(codec: Codec, text: &str) -> Vec<u8> {
    match codec {
        Codec::Utf8 => text.as_bytes().to_vec(),
        Codec::Gb18030 => GB18030.encode(text).0.into_owned(),
        Codec::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
    }
}

fn be_num(value: u64, width: usize) -> Vec<u8> {
    value.to_be_bytes()[8 - width..].to_vec()
}

/// Length-prefixed boundary key for the info table: v2 stores a u16 length
/// in characters plus a NUL-terminated key, v1 a u8 length with no
/// terminator.
fn push_boundary_key(out: &mut Vec<u8>, key: &[u8], char_width: usize, v2: bool) {
    let units = (key.len() / char_width) as u64;
    if v2 {
        out.extend_from_slice(&(units as u16).to_be_bytes());
        out.extend_from_slice(key);
        out.extend(std::iter::repeat(0u8).take(char_width));
    } else {
        out.push(units as u8);
        out.extend_from_slice(key);
    }
}

fn pack_block(tag: u8, plain: &[u8]) -> Vec<u8> {
    let mut out = vec![tag, 0, 0, 0];
    out.extend_from_slice(&adler32(plain).unwrap().to_be_bytes());
    match tag {
        RAW_TAG => out.extend_from_slice(plain),
        ZLIB_TAG => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(plain).unwrap();
            out.extend_from_slice(&encoder.finish().unwrap());
        }
        _ => panic!("fixture builder only packs raw or zlib blocks"),
    }
    out
}

/// Inverse of the reader's key-info decryption: nibble swap after XORing
/// with the payload index and the derived key, first 0x100 bytes only.
fn cipher_key_info(block: &mut [u8]) {
    let mut hasher = Ripemd128::new();
    hasher.update(&block[4..8]);
    hasher.update([0x95, 0x36, 0x00, 0x00]);
    let key: [u8; 16] = hasher.finalize().into();

    let span = (block.len() - 8).min(0x100);
    for (i, byte) in block[8..8 + span].iter_mut().enumerate() {
        let p = *byte ^ (i as u8) ^ key[i % key.len()];
        *byte = (p >> 4) | (p << 4);
    }
}
