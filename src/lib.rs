//! Reader for MDX/MDD dictionary files.
//!
//! MDX files carry textual definitions; MDD files carry binary resources
//! (images, audio, fonts) keyed by UTF-16LE path. This crate parses the
//! on-disk structure, decodes compressed and optionally encrypted blocks,
//! and answers exact-match lookups, prefix suggestions and resource
//! locates over the two-level key/record indexes.
//!
//! # Example
//! ```no_run
//! use mdx_dict::{Mdd, Mdx, ResourceEncoding};
//!
//! # fn run() -> mdx_dict::Result<()> {
//! let mdx = Mdx::new("dictionary.mdx")?;
//! println!("{}", mdx.lookup("hello")?);
//! for key in mdx.suggest("hel")? {
//!     println!("{}", key);
//! }
//!
//! let mdd = Mdd::new("dictionary.mdd")?;
//! let logo = mdd.locate("/images/logo.png", ResourceEncoding::Base64)?;
//! # Ok(())
//! # }
//! ```
//!
//! After `init()` all index state is immutable, so a dictionary can be
//! shared across threads for concurrent lookups.

mod mdict;

pub use mdict::{
    DictParams, EncryptionFlags, Format, KeyBlockInfoEntry, KeyEntry, Keys, Mdd, Mdict,
    MdictError, Mdx, RecordBlockInfoEntry, ResourceEncoding, Result, Version,
};
