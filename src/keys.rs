//! Key material: generation and splitting of the combined (AES || MAC) key.
//!
//! Combined keys are never persisted or transmitted split — only the 64-byte
//! combined form crosses a process boundary (as raw bytes or base64). Key
//! halves live only for the duration of a single pipeline run.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::constants::{IV_LENGTH, KEY_LENGTH, KEY_SET_LENGTH, MAC_LENGTH};
use crate::error::CryptoError;

/// A 64-byte `aesKey || macKey` blob, the only form callers persist or encode.
#[derive(Clone)]
pub struct CombinedKey(Zeroizing<[u8; KEY_SET_LENGTH]>);

impl CombinedKey {
    /// Validates and wraps a combined key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SET_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SET_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut buf = [0u8; KEY_SET_LENGTH];
        buf.copy_from_slice(bytes);
        Ok(Self(Zeroizing::new(buf)))
    }

    /// Decodes a base64-encoded combined key, the wire form used when
    /// persisting a `localKey`.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64.decode(encoded).map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SET_LENGTH,
            actual: 0,
        })?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.as_slice())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SET_LENGTH] {
        &self.0
    }

    /// Splits into the AES and MAC halves.
    #[must_use]
    pub fn split(&self) -> (AesKey, MacKey) {
        let mut aes = [0u8; KEY_LENGTH];
        let mut mac = [0u8; MAC_LENGTH];
        aes.copy_from_slice(&self.0[..KEY_LENGTH]);
        mac.copy_from_slice(&self.0[KEY_LENGTH..]);
        (AesKey(Zeroizing::new(aes)), MacKey(Zeroizing::new(mac)))
    }
}

/// The AES-256 half of a combined key.
#[derive(Clone)]
pub struct AesKey(Zeroizing<[u8; KEY_LENGTH]>);

impl AesKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

/// The HMAC-SHA256 half of a combined key.
#[derive(Clone)]
pub struct MacKey(Zeroizing<[u8; MAC_LENGTH]>);

impl MacKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; MAC_LENGTH] {
        &self.0
    }
}

/// Splits a raw 64-byte combined key into its AES and MAC halves, failing
/// with [`CryptoError::InvalidKeyLength`] if `raw` is not exactly
/// `KEY_SET_LENGTH` bytes.
pub fn split_keys(raw: &[u8]) -> Result<(AesKey, MacKey), CryptoError> {
    Ok(CombinedKey::from_bytes(raw)?.split())
}

/// Generates a fresh, cryptographically random combined key.
#[must_use]
pub fn generate_keys() -> CombinedKey {
    let mut buf = [0u8; KEY_SET_LENGTH];
    rand::rng().fill_bytes(&mut buf);
    CombinedKey(Zeroizing::new(buf))
}

/// Generates a fresh, cryptographically random attachment IV.
#[must_use]
pub fn generate_attachment_iv() -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    rand::rng().fill_bytes(&mut iv);
    iv
}
