//! Random-access byte reader over the dictionary file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::error::{MdictError, Result};

/// Bounds-checked positional reader.
///
/// The file cursor is guarded by a mutex so that concurrent lookups on a
/// shared dictionary never interleave seek/read pairs. Every read names its
/// full range up front; nothing is read speculatively.
pub struct BinReader {
    file: Mutex<File>,
    size: u64,
}

impl BinReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(BinReader {
            file: Mutex::new(file),
            size,
        })
    }

    /// Total file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Fails with `Truncated` when the range extends past the end of the
    /// file, so every caller's size field is validated before allocation.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let end = offset.checked_add(len).ok_or(MdictError::Truncated {
            offset,
            need: len,
            size: self.size,
        })?;
        if end > self.size {
            return Err(MdictError::Truncated {
                offset,
                need: len,
                size: self.size,
            });
        }

        let mut buf = vec![0u8; len as usize];
        // A poisoned lock only means another reader panicked between seek
        // and read; the cursor is re-established on the next seek.
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
