//! Decryptor (component C4): assembles the decryption pipeline, verifying
//! the inner MAC (and optional outer MAC, and optional digest) in constant
//! time before any bytes are treated as trustworthy.
//!
//! Grounded on `oxcrypt-core::fs::file_ctrmac`'s authenticate-then-decrypt
//! shape and its `computed_mac.as_ref().ct_eq(expected_mac)` constant-time
//! comparison, and on `oxidized-cryptolib::fs::streaming::VaultFileReader`
//! for the async chunked-read structure.

use std::path::{Path, PathBuf};

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{DIGEST_LENGTH, IV_LENGTH, MAC_LENGTH, STREAM_CHUNK_SIZE};
use crate::error::{CryptoError, ErrorContext, Result};
use crate::keys::{split_keys, AesKey, CombinedKey, MacKey};
use crate::pipeline::{CbcDecryptStage, HashTap, MacSplitter, PaddingTrimmer};
use crate::tempfile_guard::run_to_disk_guarded;

type HmacSha256 = Hmac<sha2::Sha256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Which checks the decryptor runs, beyond the inner MAC (which is always
/// checked). A tagged union per the design notes' preference for sum types.
pub enum IntegrityMode<'a> {
    /// `theirDigest` must match the computed frame digest, in constant time.
    Standard { their_digest: &'a [u8; DIGEST_LENGTH] },
    /// No digest check — the client itself produced this ciphertext.
    Local,
    /// No digest check — a client-generated thumbnail fetched post-download.
    BackupThumbnail,
}

/// Everything the decryptor needs. Borrows the path, logging id, and
/// `theirDigest` (when present) rather than cloning them.
pub struct DecryptOptions<'a> {
    pub ciphertext_path: &'a Path,
    pub id_for_logging: &'a str,
    /// Declared unpadded plaintext length, trusted by `trimPadding` — see
    /// the open question on this in the crate's design notes.
    pub size: u64,
    pub aes_key: AesKey,
    pub mac_key: MacKey,
    pub integrity_mode: IntegrityMode<'a>,
    pub outer_encryption: Option<(AesKey, MacKey)>,
}

impl<'a> DecryptOptions<'a> {
    /// Convenience constructor splitting a combined key.
    pub fn from_combined_key(
        ciphertext_path: &'a Path,
        id_for_logging: &'a str,
        size: u64,
        keys: &CombinedKey,
        integrity_mode: IntegrityMode<'a>,
    ) -> Result<Self> {
        let (aes_key, mac_key) = split_keys(keys.as_bytes())?;
        Ok(Self {
            ciphertext_path,
            id_for_logging,
            size,
            aes_key,
            mac_key,
            integrity_mode,
            outer_encryption: None,
        })
    }

    fn context(&self) -> ErrorContext {
        ErrorContext::new()
            .with_id(self.id_for_logging.to_string())
            .with_path(self.ciphertext_path.to_path_buf())
    }
}

/// Recovered plaintext metadata: the IV observed in the frame and the hex
/// plaintext hash. The file-producing wrapper additionally returns a path.
#[derive(Debug, Clone)]
pub struct DecryptedResult {
    pub iv: [u8; IV_LENGTH],
    pub plaintext_hash: String,
}

/// Decrypts into `sink`, verifying the inner MAC, the optional outer MAC,
/// and (in `standard` mode) the digest, all in constant time, before
/// returning successfully.
///
/// Per an explicit design decision documented alongside this crate: the
/// outer digest is never computed or checked, only the outer MAC — the
/// digest always covers the inner frame. This matches the reference
/// behavior this engine reproduces, not an oversight.
pub async fn decrypt_attachment_v2_to_sink(
    options: DecryptOptions<'_>,
    sink: &mut (dyn AsyncWrite + Unpin + Send),
) -> Result<DecryptedResult> {
    let context = options.context();

    let (mut reader, outer_mac_ok): (Box<dyn AsyncRead + Unpin + Send>, Option<bool>) =
        match &options.outer_encryption {
            Some((outer_aes, outer_mac)) => {
                let (inner_frame, mac_ok) =
                    peel_outer_layer(options.ciphertext_path, outer_aes, outer_mac, context.clone())
                        .await?;
                (Box::new(std::io::Cursor::new(inner_frame)), Some(mac_ok))
            }
            None => {
                let file = tokio::fs::File::open(options.ciphertext_path)
                    .await
                    .map_err(|e| CryptoError::io_open(e, context.clone()))?;
                (Box::new(file), None)
            }
        };

    let mut digest_tap = HashTap::new();
    let mut mac_splitter = MacSplitter::new(options.mac_key.as_bytes());
    let mut cbc: Option<CbcDecryptStage> = None;
    let mut iv_buffer = Vec::with_capacity(IV_LENGTH);
    let mut observed_iv = [0u8; IV_LENGTH];
    let mut trimmer = PaddingTrimmer::new(options.size);
    let mut plaintext_hash_tap = HashTap::new();

    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| CryptoError::io_read(e, context.clone()))?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        digest_tap.update(chunk);
        let stripped = mac_splitter.update(chunk);
        let mut deciphered = Vec::new();
        let mut remaining = stripped.as_slice();

        if cbc.is_none() {
            let needed = IV_LENGTH - iv_buffer.len();
            let take = needed.min(remaining.len());
            iv_buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            if iv_buffer.len() == IV_LENGTH {
                observed_iv.copy_from_slice(&iv_buffer);
                cbc = Some(CbcDecryptStage::new(options.aes_key.as_bytes(), &observed_iv));
            }
        }
        if let Some(stage) = cbc.as_mut() {
            deciphered = stage.update(remaining);
        }

        let trimmed = trimmer.update(&deciphered);
        plaintext_hash_tap.update(&trimmed);
        if !trimmed.is_empty() {
            sink.write_all(&trimmed)
                .await
                .map_err(|e| CryptoError::io_write(e, context.clone()))?;
        }
    }

    if iv_buffer.len() != IV_LENGTH {
        return Err(CryptoError::TruncatedFrame {
            expected: IV_LENGTH,
            actual: iv_buffer.len(),
            context,
        });
    }
    let cbc = cbc.ok_or_else(|| CryptoError::Internal {
        reason: "CBC decrypt stage never initialized despite a full IV".into(),
    })?;
    let leftover = cbc.finish()?;
    debug_assert!(leftover.is_empty());

    let (computed_inner_mac, their_inner_mac) = mac_splitter.finish(context.clone())?;
    sink.flush()
        .await
        .map_err(|e| CryptoError::io_write(e, context.clone()))?;

    if computed_inner_mac.ct_eq(&their_inner_mac).unwrap_u8() != 1 {
        return Err(CryptoError::BadMac { context });
    }

    if let IntegrityMode::Standard { their_digest } = &options.integrity_mode {
        let digest = digest_tap.finish();
        if digest.ct_eq(*their_digest).unwrap_u8() != 1 {
            return Err(CryptoError::BadDigest { context });
        }
    }

    if let Some(mac_ok) = outer_mac_ok {
        if !mac_ok {
            return Err(CryptoError::BadOuterMac { context });
        }
    }

    Ok(DecryptedResult {
        iv: observed_iv,
        plaintext_hash: hex::encode(plaintext_hash_tap.finish()),
    })
}

/// Reads the outer frame fully into memory, verifies its MAC and recovers
/// the inner frame bytes (real PKCS#7 removed — the outer layer carries no
/// logical zero-padding of its own, unlike the inner plaintext). Returns
/// the inner frame and whether the outer MAC matched, deferring the actual
/// failure to the caller so check ordering matches the spec (inner MAC,
/// then digest, then outer MAC).
///
/// This buffers the whole outer ciphertext rather than streaming it — a
/// deliberate simplification for the comparatively rare backup-fetch path;
/// see this crate's design notes.
async fn peel_outer_layer(
    path: &Path,
    outer_aes: &AesKey,
    outer_mac: &MacKey,
    context: ErrorContext,
) -> Result<(Vec<u8>, bool)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CryptoError::io_open(e, context.clone()))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .await
        .map_err(|e| CryptoError::io_read(e, context.clone()))?;

    if buf.len() < IV_LENGTH + MAC_LENGTH {
        return Err(CryptoError::TruncatedFrame {
            expected: IV_LENGTH + MAC_LENGTH,
            actual: buf.len(),
            context,
        });
    }

    let mac_start = buf.len() - MAC_LENGTH;
    let their_mac = &buf[mac_start..];
    let mut mac = HmacSha256::new_from_slice(outer_mac.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(&buf[..mac_start]);
    let computed_mac = mac.finalize().into_bytes();
    let mac_ok = computed_mac.as_slice().ct_eq(their_mac).unwrap_u8() == 1;

    let iv: [u8; IV_LENGTH] = buf[..IV_LENGTH].try_into().unwrap();
    let ciphertext = &buf[IV_LENGTH..mac_start];

    let mut decryptor = Aes256CbcDec::new(outer_aes.as_bytes().into(), &iv.into());
    let inner_frame = match decryptor.decrypt_padded_vec_mut::<Pkcs7>(ciphertext) {
        Ok(frame) => frame,
        Err(_) if !mac_ok => return Err(CryptoError::BadOuterMac { context }),
        Err(_) => {
            return Err(CryptoError::Internal {
                reason: "invalid PKCS#7 padding in outer layer despite a valid outer MAC".into(),
            })
        }
    };

    Ok((inner_frame, mac_ok))
}

/// File-producing variant: writes the recovered plaintext to a temp file
/// beside `dest` and atomically renames it into place on success.
pub async fn decrypt_attachment_v2(
    options: DecryptOptions<'_>,
    dest: &Path,
) -> Result<(DecryptedResult, PathBuf)> {
    let result = run_to_disk_guarded(dest, move |file| {
        Box::pin(async move {
            let mut file = file;
            decrypt_attachment_v2_to_sink(options, &mut file).await
        })
    })
    .await?;
    Ok((result, dest.to_path_buf()))
}
