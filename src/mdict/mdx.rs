//! MDX text-dictionary facade.

use std::path::Path;

use super::error::{MdictError, Result};
use super::iter::Keys;
use super::models::{DictParams, Format};
use super::Mdict;

/// An indexed MDX dictionary.
pub struct Mdx {
    dict: Mdict,
}

impl Mdx {
    /// Open and index an `.mdx` dictionary in one step.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut dict = Mdict::new(path)?;
        if dict.format() != Format::Mdx {
            return Err(MdictError::CorruptFormat(format!(
                "{} is not an .mdx file",
                dict.path().display()
            )));
        }
        dict.init()?;
        Ok(Mdx { dict })
    }

    /// Exact-match lookup. The value bytes are decoded in the dictionary
    /// encoding and any trailing NUL is stripped.
    pub fn lookup(&self, word: &str) -> Result<String> {
        let bytes = self.dict.fetch(word)?;
        let text = self.dict.params()?.decode_text(&bytes);
        Ok(text.trim_end_matches('\0').to_string())
    }

    pub fn contains(&self, word: &str) -> Result<bool> {
        self.dict.contains(word)
    }

    /// Keys starting with `prefix`, in file order.
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
