//! Lazy iteration over dictionary keys.

use super::error::Result;
use super::key_index::RawKeyEntry;
use super::models::KeyEntry;
use super::Mdict;

/// Iterator over all `(record_offset, key)` entries in file order.
///
/// Decompresses one key block at a time, so memory stays proportional to a
/// single block. Created by [`Mdict::keys()`]; every call yields a fresh,
/// restartable pass over the same sequence. A decode failure is yielded
/// once, after which the iterator is exhausted.
pub struct Keys<'a> {
    dict: &'a Mdict,
    next_block: usize,
    pending: std::vec::IntoIter<RawKeyEntry>,
    finished: bool,
}

impl<'a> Keys<'a> {
    pub(super) fn new(dict: &'a Mdict) -> Self {
        Keys {
            dict,
            next_block: 0,
            pending: Vec::new().into_iter(),
            finished: false,
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = Result<KeyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let state = match self.dict.state() {
            Ok(state) => state,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        loop {
            if let Some(raw) = self.pending.next() {
                return Some(Ok(KeyEntry {
                    record_offset: raw.record_offset,
                    key_text: state.params.decode_text(&raw.key),
                }));
            }

            if self.next_block >= state.key_index.blocks.len() {
                self.finished = true;
                return None;
            }
            match self.dict.load_key_block(self.next_block) {
                Ok(entries) => {
                    self.pending = entries.into_iter();
                    self.next_block += 1;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
