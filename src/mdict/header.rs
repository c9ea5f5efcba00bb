//! Header parsing and parameter negotiation.

use std::collections::HashMap;

use adler32::adler32;
use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::{Encoding, UTF_16LE};
use log::{debug, info};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::error::{MdictError, Result};
use super::models::{DictParams, EncryptionFlags, Format, Version};
use super::reader::BinReader;
use super::utils::be_uint;

/// Parsed file header: negotiated parameters plus the offset where the key
/// section starts.
pub struct ParsedHeader {
    pub params: DictParams,
    /// File offset of the key-block header (`header_len + 8`).
    pub key_section_start: u64,
}

/// Parse the dictionary header.
///
/// Layout:
/// - 4 bytes: XML length `L` (big-endian)
/// - `L` bytes: UTF-16LE XML
/// - 4 bytes: Adler32 of the XML bytes (stored little-endian)
pub fn parse(reader: &BinReader, format: Format, passcode: Option<String>) -> Result<ParsedHeader> {
    let header_len = be_uint(&reader.read_at(0, 4)?);
    let xml_bytes = reader.read_at(4, header_len)?;

    let stored_checksum = LittleEndian::read_u32(&reader.read_at(4 + header_len, 4)?);
    let actual_checksum = adler32(xml_bytes.as_slice())?;
    if actual_checksum != stored_checksum {
        return Err(MdictError::CorruptFormat(format!(
            "header checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored_checksum, actual_checksum
        )));
    }

    // The header text is always UTF-16LE, regardless of the dictionary
    // encoding. Some generators leave stray control characters in the XML.
    let (decoded, _, _) = UTF_16LE.decode(&xml_bytes);
    let sanitized: String = decoded
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    let attrs = extract_attributes(&sanitized)?;
    debug!("header attributes: {:?}", attrs.keys().collect::<Vec<_>>());

    let params = negotiate(&attrs, format, passcode)?;
    info!(
        "header parsed: engine {}, encoding {}, format {:?}",
        params.engine_version,
        params.encoding.name(),
        params.format
    );

    Ok(ParsedHeader {
        params,
        key_section_start: header_len + 8,
    })
}

/// Pull the attribute map off the XML root element.
fn extract_attributes(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return e
                    .attributes()
                    .map(|attr| {
                        let attr = attr.map_err(|e| {
                            MdictError::CorruptFormat(format!("bad header attribute: {}", e))
                        })?;
                        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                MdictError::CorruptFormat(format!(
                                    "bad header attribute value: {}",
                                    e
                                ))
                            })?
                            .into_owned();
                        Ok((key, value))
                    })
                    .collect();
            }
            Ok(Event::Eof) => {
                return Err(MdictError::CorruptFormat(
                    "no root element in header XML".to_string(),
                ))
            }
            Err(e) => {
                return Err(MdictError::CorruptFormat(format!(
                    "header XML parse error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Turn raw header attributes into negotiated parameters.
fn negotiate(
    attrs: &HashMap<String, String>,
    format: Format,
    passcode: Option<String>,
) -> Result<DictParams> {
    let version_str = attrs
        .get("GeneratedByEngineVersion")
        .map(String::as_str)
        .unwrap_or("1.2");
    let engine_version: f32 = version_str.parse().map_err(|_| {
        MdictError::CorruptFormat(format!("unparseable engine version {:?}", version_str))
    })?;
    let version = Version::try_from(engine_version)?;

    let encryption = parse_encrypted(attrs.get("Encrypted").map(String::as_str))?;

    // An absent or empty Encoding means UTF-8; the GBK family is normalized
    // to its GB18030 superset. MDD files key resources by UTF-16LE path, so
    // the declared encoding is overridden.
    let encoding = if format == Format::Mdd {
        UTF_16LE
    } else {
        attrs
            .get("Encoding")
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "GBK" || s == "GB2312" {
                    "GB18030"
                } else {
                    s.as_str()
                }
            })
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(encoding_rs::UTF_8)
    };

    Ok(DictParams {
        version,
        engine_version,
        encoding,
        encryption,
        format,
        passcode,
        title: attrs.get("Title").cloned(),
        description: attrs.get("Description").cloned(),
        stylesheet: attrs.get("StyleSheet").cloned(),
    })
}

/// The `Encrypted` attribute is either the legacy "Yes"/"No" pair or a
/// numeric bitmask (bit 0: record blocks, bit 1: key info).
fn parse_encrypted(value: Option<&str>) -> Result<EncryptionFlags> {
    match value {
        None | Some("") | Some("No") => Ok(EncryptionFlags::default()),
        Some("Yes") => Ok(EncryptionFlags {
            record_blocks: true,
            key_info: false,
        }),
        Some(s) => {
            let bits: u8 = s.parse().map_err(|_| {
                MdictError::CorruptFormat(format!("unparseable Encrypted attribute {:?}", s))
            })?;
            Ok(EncryptionFlags {
                record_blocks: bits & 0x01 != 0,
                key_info: bits & 0x02 != 0,
            })
        }
    }
}
