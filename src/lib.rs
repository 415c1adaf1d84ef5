//! Streaming attachment encryption/decryption engine (AttachmentCryptoV2).
//!
//! Produces and consumes a self-contained ciphertext frame —
//! `IV (16B) || AES-256-CBC(padded plaintext) || HMAC-SHA256 (32B)` —
//! alongside a whole-frame digest and a plaintext content hash, and
//! supports re-encrypting a fetched attachment under a fresh local key
//! without ever writing the recovered plaintext to disk.
//!
//! This is deliberately Encrypt-then-MAC over a non-authenticated cipher
//! mode, not an AEAD construction: see [`pipeline`] for why the two
//! padding layers (logical zero-padding and PKCS#7) are kept separate, and
//! [`error`] for the integrity-failure taxonomy callers must treat as
//! uniformly severe.

pub mod constants;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod reencrypt;
mod tempfile_guard;

pub use constants::{
    AES_CBC_BLOCK_SIZE, DIGEST_LENGTH, HEX_DIGEST_LENGTH, IV_LENGTH, KEY_LENGTH, KEY_SET_LENGTH,
    MAC_LENGTH,
};
pub use decrypt::{
    decrypt_attachment_v2, decrypt_attachment_v2_to_sink, DecryptOptions, DecryptedResult,
    IntegrityMode,
};
pub use encrypt::{
    encrypt_attachment_v2, encrypt_attachment_v2_to_disk, get_attachment_ciphertext_length,
    get_plaintext_hash_for_in_memory_attachment, DangerousIv, EncryptedResult, PlaintextSource,
};
pub use error::{CryptoError, ErrorContext, Result};
pub use keys::{generate_attachment_iv, generate_keys, split_keys, AesKey, CombinedKey, MacKey};
pub use pipeline::{NoPadding, PadTarget, PowerOfTwoBucketPadding};
pub use reencrypt::{decrypt_and_reencrypt_locally, ReencryptedResult};
