//! AES-256-CBC encrypt/decrypt stages.
//!
//! These are the only two stream primitives that need real block-cipher
//! state threaded between calls (CBC chaining). Everything else in
//! [`super::stages`] is a pure function of the bytes it has seen.

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use generic_array::GenericArray;

use crate::constants::AES_CBC_BLOCK_SIZE;
use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypts a plaintext stream with AES-256-CBC, applying real PKCS#7 block
/// padding on [`Self::finish`]. This is `aesCbcEncrypt(iv)` in the spec.
pub struct CbcEncryptStage {
    cipher: Aes256CbcEnc,
    buffer: Vec<u8>,
}

impl CbcEncryptStage {
    pub fn new(aes_key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self {
            cipher: Aes256CbcEnc::new(aes_key.into(), iv.into()),
            buffer: Vec::with_capacity(AES_CBC_BLOCK_SIZE),
        }
    }

    /// Feeds plaintext bytes in, returning any ciphertext blocks that became
    /// available (i.e. all full blocks seen so far).
    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        self.buffer.extend_from_slice(data);
        let mut out = Vec::with_capacity(self.buffer.len());
        let mut offset = 0;
        while self.buffer.len() - offset >= AES_CBC_BLOCK_SIZE {
            let mut block = GenericArray::clone_from_slice(
                &self.buffer[offset..offset + AES_CBC_BLOCK_SIZE],
            );
            self.cipher.encrypt_block_mut(&mut block);
            out.extend_from_slice(&block);
            offset += AES_CBC_BLOCK_SIZE;
        }
        self.buffer.drain(..offset);
        out
    }

    /// Pads the final partial (or empty) block with PKCS#7 and encrypts it.
    /// Always emits exactly one final block, even for plaintext that was
    /// already block-aligned.
    pub fn finish(mut self) -> Vec<u8> {
        let pad_len = AES_CBC_BLOCK_SIZE - (self.buffer.len() % AES_CBC_BLOCK_SIZE);
        self.buffer
            .extend(std::iter::repeat_n(pad_len as u8, pad_len));
        debug_assert_eq!(self.buffer.len(), AES_CBC_BLOCK_SIZE);
        let mut block = GenericArray::clone_from_slice(&self.buffer);
        self.cipher.encrypt_block_mut(&mut block);
        block.to_vec()
    }
}

/// Decrypts an AES-256-CBC ciphertext stream block-by-block.
///
/// Per the spec, this stage does **not** remove PKCS#7 padding: the
/// decrypted blocks (logical zero-padding, real data, and the PKCS#7
/// trailer) are all passed through unchanged. Removing the trailer is
/// `trimPadding`'s job, driven by the caller-declared plaintext size — see
/// [`super::stages::PaddingTrimmer`].
pub struct CbcDecryptStage {
    cipher: Aes256CbcDec,
    buffer: Vec<u8>,
}

impl CbcDecryptStage {
    pub fn new(aes_key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self {
            cipher: Aes256CbcDec::new(aes_key.into(), iv.into()),
            buffer: Vec::with_capacity(AES_CBC_BLOCK_SIZE),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        self.buffer.extend_from_slice(data);
        let mut out = Vec::with_capacity(self.buffer.len());
        let mut offset = 0;
        while self.buffer.len() - offset >= AES_CBC_BLOCK_SIZE {
            let mut block = GenericArray::clone_from_slice(
                &self.buffer[offset..offset + AES_CBC_BLOCK_SIZE],
            );
            self.cipher.decrypt_block_mut(&mut block);
            out.extend_from_slice(&block);
            offset += AES_CBC_BLOCK_SIZE;
        }
        self.buffer.drain(..offset);
        out
    }

    /// Fails with [`CryptoError::TruncatedFrame`] if the ciphertext was not
    /// a whole number of AES blocks.
    pub fn finish(self) -> Result<Vec<u8>, CryptoError> {
        if !self.buffer.is_empty() {
            return Err(CryptoError::TruncatedFrame {
                expected: AES_CBC_BLOCK_SIZE,
                actual: self.buffer.len(),
                context: crate::error::ErrorContext::new(),
            });
        }
        Ok(Vec::new())
    }
}
