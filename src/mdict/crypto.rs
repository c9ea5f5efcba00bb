//! Decryption of the key-block-info table.

use ripemd::{Digest, Ripemd128};

/// Only this many payload bytes are ever ciphered; the remainder of an
/// encrypted key-info table passes through untouched.
const CIPHERED_SPAN: usize = 0x100;

/// Derive the 16-byte XOR key for an encrypted key-info table.
///
/// The salt is the table's own Adler32 word (block header bytes 4..8),
/// extended with the fixed suffix `95 36 00 00`.
pub fn key_info_key(checksum: [u8; 4]) -> [u8; 16] {
    let mut hasher = Ripemd128::new();
    hasher.update(checksum);
    hasher.update([0x95, 0x36, 0x00, 0x00]);
    hasher.finalize().into()
}

/// Decrypt an encrypted key-info block in place.
///
/// `block` is the whole table including its 8-byte tag+checksum header;
/// only the payload is ciphered. Each ciphered byte has its nibbles
/// swapped, then is XORed with its payload index and a key byte.
pub fn decrypt_key_info(block: &mut [u8]) {
    if block.len() < 8 {
        return;
    }
    let mut checksum = [0u8; 4];
    checksum.copy_from_slice(&block[4..8]);
    let key = key_info_key(checksum);

    let span = (block.len() - 8).min(CIPHERED_SPAN);
    for (i, byte) in block[8..8 + span].iter_mut().enumerate() {
        let c = *byte;
        *byte = ((c >> 4) | (c << 4)) ^ (i as u8) ^ key[i % key.len()];
    }
}
