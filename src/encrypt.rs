//! Encryptor (component C3): assembles the encryption pipeline, producing a
//! ciphertext frame plus the digest/IV/plaintext-hash/size quadruple callers
//! need to record alongside it.
//!
//! Grounded on `oxcrypt-core::fs::file`'s "assemble pipeline, produce result
//! struct" shape, and on `oxidized-cryptolib::fs::streaming::VaultFileWriter`
//! for the file-producing variant (temp file, write, atomic rename).

use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{ciphertext_frame_len, DIGEST_LENGTH, IV_LENGTH, STREAM_CHUNK_SIZE};
use crate::error::{CryptoError, ErrorContext, Result};
use crate::keys::{generate_attachment_iv, split_keys, CombinedKey};
use crate::pipeline::{
    CbcEncryptStage, HashTap, IvPrepend, MacAppender, NoPadding, PadTarget, Padder, SizeMeter,
};
use crate::tempfile_guard::run_to_disk_guarded;

/// Where encryptor input comes from. Tagged union, per the design notes'
/// preference for sum types over ad hoc runtime dispatch.
pub enum PlaintextSource {
    InMemory(Vec<u8>),
    Reader(Pin<Box<dyn AsyncRead + Send>>),
    Path(PathBuf),
}

impl PlaintextSource {
    async fn into_reader(self) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        match self {
            Self::InMemory(bytes) => Ok(Box::pin(std::io::Cursor::new(bytes))),
            Self::Reader(reader) => Ok(reader),
            Self::Path(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|e| {
                    CryptoError::io_open(e, ErrorContext::new().with_path(path.clone()))
                })?;
                Ok(Box::pin(file))
            }
        }
    }
}

/// The forced-IV escape hatch. `Test` requires the crate to be built with
/// the `test-support` feature; `ReencryptingForBackup` is a normal
/// production path used only by the backup re-encryption flow and carries
/// no such gate (see invariant 7/8 in the spec this crate implements).
pub enum DangerousIv {
    Test {
        iv: [u8; IV_LENGTH],
    },
    ReencryptingForBackup {
        iv: [u8; IV_LENGTH],
        digest_to_match: [u8; DIGEST_LENGTH],
    },
}

impl DangerousIv {
    #[must_use]
    pub fn test(iv: [u8; IV_LENGTH]) -> Self {
        Self::Test { iv }
    }

    pub fn reencrypting_for_backup(iv: [u8; IV_LENGTH], digest_to_match: &[u8]) -> Result<Self> {
        if digest_to_match.len() != DIGEST_LENGTH {
            return Err(CryptoError::InvalidDigestLength {
                expected: DIGEST_LENGTH,
                actual: digest_to_match.len(),
            });
        }
        let mut digest = [0u8; DIGEST_LENGTH];
        digest.copy_from_slice(digest_to_match);
        Ok(Self::ReencryptingForBackup {
            iv,
            digest_to_match: digest,
        })
    }

    fn iv(&self) -> [u8; IV_LENGTH] {
        match self {
            Self::Test { iv } | Self::ReencryptingForBackup { iv, .. } => *iv,
        }
    }
}

/// Everything the encryptor produces: enough for the caller to both verify
/// and record the ciphertext without re-reading it.
#[derive(Debug, Clone)]
pub struct EncryptedResult {
    pub digest: [u8; DIGEST_LENGTH],
    pub iv: [u8; IV_LENGTH],
    pub plaintext_hash: String,
    pub ciphertext_size: u64,
}

/// Encrypts `input` under `keys`, optionally writing the resulting frame to
/// `sink`. When `sink` is `None` the pipeline still runs to completion (so
/// digest/hash/size are computed) but produces no persisted output — used
/// for in-memory-only encryption.
pub async fn encrypt_attachment_v2(
    input: PlaintextSource,
    keys: &CombinedKey,
    dangerous_iv: Option<DangerousIv>,
    skip_padding: bool,
    mut sink: Option<&mut (dyn AsyncWrite + Unpin + Send)>,
    padder: &dyn PadTarget,
) -> Result<EncryptedResult> {
    if skip_padding && !cfg!(feature = "test-support") {
        return Err(CryptoError::TestOnlyFeatureUsed {
            context: ErrorContext::new(),
        });
    }
    if matches!(&dangerous_iv, Some(DangerousIv::Test { .. })) && !cfg!(feature = "test-support") {
        return Err(CryptoError::TestOnlyFeatureUsed {
            context: ErrorContext::new(),
        });
    }

    let (aes_key, mac_key) = split_keys(keys.as_bytes())?;
    let iv = dangerous_iv
        .as_ref()
        .map(DangerousIv::iv)
        .unwrap_or_else(generate_attachment_iv);

    let mut reader = input.into_reader().await?;
    let mut plaintext_hash_tap = HashTap::new();
    let mut cbc = CbcEncryptStage::new(aes_key.as_bytes(), &iv);
    let no_pad = NoPadding;
    let effective_padder: &dyn PadTarget = if skip_padding { &no_pad } else { padder };
    let mut padder_stage = Padder::new(effective_padder);
    let mut iv_prepend = IvPrepend::new(iv);
    let mut mac_appender = MacAppender::new(mac_key.as_bytes());
    let mut digest_tap = HashTap::new();
    let mut size_meter = SizeMeter::new();

    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| CryptoError::io_read(e, ErrorContext::new()))?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        plaintext_hash_tap.update(chunk);
        padder_stage.update(chunk);
        let ciphertext = cbc.update(chunk);
        emit(
            &ciphertext,
            &mut iv_prepend,
            &mut mac_appender,
            &mut digest_tap,
            &mut size_meter,
            sink.as_deref_mut(),
        )
        .await?;
    }

    let padding_bytes = padder_stage.finish();
    let ciphertext = cbc.update(&padding_bytes);
    emit(
        &ciphertext,
        &mut iv_prepend,
        &mut mac_appender,
        &mut digest_tap,
        &mut size_meter,
        sink.as_deref_mut(),
    )
    .await?;
    let final_block = cbc.finish();
    emit(
        &final_block,
        &mut iv_prepend,
        &mut mac_appender,
        &mut digest_tap,
        &mut size_meter,
        sink.as_deref_mut(),
    )
    .await?;

    // Flush whatever prependIv is still holding (only reachable if the
    // ciphertext stream was, impossibly, empty; aesCbcEncrypt always emits
    // at least one PKCS#7 block, so this is always empty in practice).
    let tail = iv_prepend.finish();
    emit_raw(
        &tail,
        &mut digest_tap,
        &mut size_meter,
        sink.as_deref_mut(),
    )
    .await?;

    let mac_tag = mac_appender.finish();
    emit_raw(&mac_tag, &mut digest_tap, &mut size_meter, sink.as_deref_mut()).await?;

    if let Some(sink) = sink {
        sink.flush()
            .await
            .map_err(|e| CryptoError::io_write(e, ErrorContext::new()))?;
    }

    let digest = digest_tap.finish();
    let ciphertext_size = size_meter.finish();
    let plaintext_hash = hex::encode(plaintext_hash_tap.finish());

    if let DangerousIv::ReencryptingForBackup { digest_to_match, .. } =
        dangerous_iv.unwrap_or(DangerousIv::Test { iv })
    {
        use subtle::ConstantTimeEq;
        if digest.ct_eq(&digest_to_match).unwrap_u8() != 1 {
            return Err(CryptoError::ReencryptedDigestMismatch {
                context: ErrorContext::new(),
            });
        }
    }

    Ok(EncryptedResult {
        digest,
        iv,
        plaintext_hash,
        ciphertext_size,
    })
}

/// Feeds ciphertext bytes through `iv_prepend`, `mac_appender`, `digest_tap`,
/// `size_meter`, and an optional sink, in that order — the downstream half
/// of the encryption pipeline described in the frame-layout ordering.
async fn emit(
    ciphertext: &[u8],
    iv_prepend: &mut IvPrepend,
    mac_appender: &mut MacAppender,
    digest_tap: &mut HashTap,
    size_meter: &mut SizeMeter,
    sink: Option<&mut (dyn AsyncWrite + Unpin + Send)>,
) -> Result<()> {
    let framed = iv_prepend.update(ciphertext);
    mac_appender.update(&framed);
    emit_raw(&framed, digest_tap, size_meter, sink).await
}

/// Feeds frame bytes that are already final (no longer subject to MAC
/// computation, e.g. the MAC tag itself) through `digest_tap`/`size_meter`
/// and the sink.
async fn emit_raw(
    bytes: &[u8],
    digest_tap: &mut HashTap,
    size_meter: &mut SizeMeter,
    sink: Option<&mut (dyn AsyncWrite + Unpin + Send)>,
) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    digest_tap.update(bytes);
    size_meter.update(bytes);
    if let Some(sink) = sink {
        sink.write_all(bytes)
            .await
            .map_err(|e| CryptoError::io_write(e, ErrorContext::new()))?;
    }
    Ok(())
}

/// File-producing variant: writes the frame to a temp file beside `dest`
/// and atomically renames it into place on success, per the temp-file
/// guard (C6).
pub async fn encrypt_attachment_v2_to_disk(
    input: PlaintextSource,
    keys: &CombinedKey,
    dangerous_iv: Option<DangerousIv>,
    skip_padding: bool,
    padder: &dyn PadTarget,
    dest: &Path,
) -> Result<(EncryptedResult, PathBuf)> {
    let result = run_to_disk_guarded(dest, |file| {
        Box::pin(async move {
            let mut file = file;
            encrypt_attachment_v2(input, keys, dangerous_iv, skip_padding, Some(&mut file), padder)
                .await
        })
    })
    .await?;
    Ok((result, dest.to_path_buf()))
}

/// Computes the ciphertext frame length for a given plaintext length,
/// assuming no logical padding is applied beyond PKCS#7 (i.e. `padder`
/// was the identity function). Callers with a real padding policy should
/// instead read `EncryptedResult::ciphertext_size` from an actual run.
#[must_use]
pub fn get_attachment_ciphertext_length(plaintext_len: u64) -> u64 {
    ciphertext_frame_len(plaintext_len)
}

/// Computes the plaintext hash of an already-in-memory attachment without
/// running the encryption pipeline at all.
#[must_use]
pub fn get_plaintext_hash_for_in_memory_attachment(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}
