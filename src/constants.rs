//! Fixed sizes and the cipher/hash selection for the V2 attachment frame.
//!
//! Frame layout: `IV (16B) || AES-256-CBC(padded plaintext) || HMAC-SHA256 (32B)`.

/// Length of a single AES/MAC key half, in bytes.
pub const KEY_LENGTH: usize = 32;

/// Length of the HMAC-SHA256 tag, in bytes.
pub const MAC_LENGTH: usize = 32;

/// Length of the AES-CBC initialization vector, in bytes.
pub const IV_LENGTH: usize = 16;

/// Length of the SHA-256 frame digest, in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Length of the plaintext hash when hex-encoded.
pub const HEX_DIGEST_LENGTH: usize = 64;

/// AES block size, in bytes. PKCS#7 padding always rounds up to a multiple of this.
pub const AES_CBC_BLOCK_SIZE: usize = 16;

/// Length of a combined (AES key || MAC key) blob, in bytes.
pub const KEY_SET_LENGTH: usize = KEY_LENGTH + MAC_LENGTH;

/// Size of the chunks the streaming pipeline reads from its source.
///
/// Not part of the wire format — purely an implementation detail of how much
/// memory a single pipeline step holds at once.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Computes the ciphertext length AES-256-CBC with PKCS#7 produces for a
/// padded-plaintext length of `n` bytes.
///
/// PKCS#7 always adds a full block of padding, even when `n` is already a
/// multiple of the block size.
#[must_use]
pub fn aes_cbc_ciphertext_len(n: u64) -> u64 {
    (n / AES_CBC_BLOCK_SIZE as u64 + 1) * AES_CBC_BLOCK_SIZE as u64
}

/// Computes the total on-disk/on-wire frame length for a given *padded*
/// plaintext length: `IV + AES-CBC(padded) + MAC`.
#[must_use]
pub fn ciphertext_frame_len(padded_plaintext_len: u64) -> u64 {
    IV_LENGTH as u64 + aes_cbc_ciphertext_len(padded_plaintext_len) + MAC_LENGTH as u64
}
