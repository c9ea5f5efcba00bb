//! MDD resource-file facade.
//!
//! MDD files store binary resources (images, audio, fonts, CSS) keyed by
//! UTF-16LE path, e.g. `/images/logo.png` or `\sound\a.spx`.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::error::{MdictError, Result};
use super::iter::Keys;
use super::models::{DictParams, Format, ResourceEncoding};
use super::Mdict;

/// An indexed MDD resource file.
pub struct Mdd {
    dict: Mdict,
}

impl Mdd {
    /// Open and index an `.mdd` resource file in one step.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut dict = Mdict::new(path)?;
        if dict.format() != Format::Mdd {
            return Err(MdictError::CorruptFormat(format!(
                "{} is not an .mdd file",
                dict.path().display()
            )));
        }
        dict.init()?;
        Ok(Mdd { dict })
    }

    /// Locate a resource and render its bytes in the requested encoding.
    pub fn locate(&self, resource_name: &str, encoding: ResourceEncoding) -> Result<String> {
        let bytes = self.dict.fetch(resource_name)?;
        Ok(match encoding {
            ResourceEncoding::Base64 => BASE64.encode(&bytes),
            ResourceEncoding::Hex => hex::encode(&bytes),
        })
    }

    /// Locate a resource and return its raw bytes.
    pub fn locate_raw(&self, resource_name: &str) -> Result<Vec<u8>> {
        self.dict.fetch(resource_name)
    }

    pub fn contains(&self, resource_name: &str) -> Result<bool> {
        self.dict.contains(resource_name)
    }

    /// Resource paths starting with `prefix`, in file order.
    pub fn suggest(&self, prefix: &str) -> Result<Vec<String>> {
        self.dict.suggest(prefix)
    }

    pub fn keys(&self) -> Keys<'_> {
        self.dict.keys()
    }

    pub fn entry_count(&self) -> Result<u64> {
        self.dict.entry_count()
    }

    pub fn params(&self) -> Result<&DictParams> {
        self.dict.params()
    }

    /// Access the underlying format-agnostic handle.
    pub fn as_dict(&self) -> &Mdict {
        &self.dict
    }
}
