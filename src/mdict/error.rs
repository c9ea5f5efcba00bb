//! Error types for the mdx-dict crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum MdictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested key does not exist in the dictionary.
    ///
    /// This is a domain-negative result rather than a failure: `lookup` and
    /// `locate` return it for any well-formed word that simply is not there.
    #[error("key not found")]
    NotFound,

    /// The file is structurally invalid: a checksum, size total or ordering
    /// invariant of the MDict format does not hold.
    #[error("corrupt dictionary: {0}")]
    CorruptFormat(String),

    /// A single compressed block failed to decode. Surfaced only when the
    /// block is actually touched by a lookup or iteration.
    #[error("corrupt block {block}: {reason}")]
    CorruptBlock { block: usize, reason: String },

    /// Record blocks are encrypted. Decrypting them requires a passcode
    /// derivation this crate does not implement.
    #[error("record blocks are encrypted; record encryption is not supported")]
    UnsupportedEncryption,

    /// The engine version is outside the supported 1.x/2.x range.
    #[error("unsupported engine version {0}; only 1.x and 2.x dictionaries are readable")]
    UnsupportedVersion(f32),

    /// A read past the end of the file was requested.
    #[error("truncated file: need {need} bytes at offset {offset}, file is {size} bytes")]
    Truncated { offset: u64, need: u64, size: u64 },

    /// An operation was attempted before `init()` populated the indexes.
    #[error("dictionary is not initialized; call init() first")]
    NotInitialized,
}

/// A convenience `Result` type alias using the crate's `MdictError` type.
pub type Result<T> = std::result::Result<T, MdictError>;
