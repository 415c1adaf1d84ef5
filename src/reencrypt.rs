//! Re-encryptor (component C5): decrypts under one key and re-encrypts
//! under a freshly generated one, without ever materializing the plaintext
//! on disk.
//!
//! The decrypt and encrypt pipelines run concurrently, connected by a
//! bounded in-memory pipe, mirroring `VaultOperationsAsync`'s documented use
//! of `tokio::join!`/`tokio::spawn` for concurrent vault operations.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::constants::STREAM_CHUNK_SIZE;
use crate::decrypt::{decrypt_attachment_v2_to_sink, DecryptOptions};
use crate::encrypt::{encrypt_attachment_v2, PlaintextSource};
use crate::error::Result;
use crate::keys::generate_keys;
use crate::pipeline::PowerOfTwoBucketPadding;
use crate::tempfile_guard::run_to_disk_guarded;

/// Everything the caller needs to address and re-decrypt the rekeyed
/// attachment: the output path, the base64 IV and combined key, the
/// recovered plaintext hash (unchanged by re-encryption), and the frame
/// version this crate writes (`2`).
#[derive(Debug, Clone)]
pub struct ReencryptedResult {
    pub path: PathBuf,
    pub iv_b64: String,
    pub local_key_b64: String,
    pub plaintext_hash: String,
    pub version: u8,
}

/// Decrypts the attachment described by `options` and re-encrypts it under
/// a fresh local key, writing the result to `dest`. The plaintext never
/// touches disk: it flows through a bounded `tokio::io::duplex` pipe
/// directly from the decrypt pipeline into the encrypt pipeline.
///
/// Re-encrypted output is padded with the same default bucketing policy
/// as any other locally-stored attachment (see this crate's design notes
/// for why the padding policy isn't parametrized here, unlike
/// `encrypt_attachment_v2`).
pub async fn decrypt_and_reencrypt_locally(
    options: DecryptOptions<'_>,
    dest: &Path,
) -> Result<ReencryptedResult> {
    let local_key = generate_keys();
    let local_key_b64 = local_key.to_base64();
    let padder = PowerOfTwoBucketPadding;

    let (plaintext_hash, encrypted_iv) = run_to_disk_guarded(dest, move |file| {
        Box::pin(async move {
            let mut encrypt_sink = file;
            let (bridge_reader, bridge_writer) = tokio::io::duplex(STREAM_CHUNK_SIZE);

            let decrypt_fut = async move {
                let mut writer = bridge_writer;
                let result = decrypt_attachment_v2_to_sink(options, &mut writer).await;
                drop(writer);
                result
            };
            let encrypt_fut = async {
                encrypt_attachment_v2(
                    PlaintextSource::Reader(Box::pin(bridge_reader)),
                    &local_key,
                    None,
                    false,
                    Some(&mut encrypt_sink),
                    &padder,
                )
                .await
            };

            let (decrypted, encrypted) = tokio::try_join!(decrypt_fut, encrypt_fut)?;
            Ok((decrypted.plaintext_hash, encrypted.iv))
        })
    })
    .await?;

    Ok(ReencryptedResult {
        path: dest.to_path_buf(),
        iv_b64: BASE64.encode(encrypted_iv),
        local_key_b64,
        plaintext_hash,
        version: 2,
    })
}
