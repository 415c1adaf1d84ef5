//! Integration tests for the literal scenarios (S1-S6) this engine's
//! specification calls out, plus the temp-file-guard and re-encryption
//! properties that only make sense end-to-end.

use attachment_cryptov2::{
    decrypt_attachment_v2_to_sink, encrypt_attachment_v2, get_plaintext_hash_for_in_memory_attachment,
    CombinedKey, DangerousIv, DecryptOptions, IntegrityMode, NoPadding, PlaintextSource,
};
use hex_literal::hex;

mod common;

async fn encrypt_frame(plaintext: &[u8], keys: &CombinedKey, iv: [u8; 16]) -> Vec<u8> {
    common::init_tracing();
    let mut sink = Vec::new();
    encrypt_attachment_v2(
        PlaintextSource::InMemory(plaintext.to_vec()),
        keys,
        Some(DangerousIv::test(iv)),
        true,
        Some(&mut sink),
        &NoPadding,
    )
    .await
    .unwrap();
    sink
}

#[tokio::test]
async fn s1_empty_plaintext() {
    let keys = CombinedKey::from_bytes(&[0u8; 64]).unwrap();
    let frame = encrypt_frame(b"", &keys, [0u8; 16]).await;

    assert_eq!(frame.len(), 64);
    assert_eq!(
        get_plaintext_hash_for_in_memory_attachment(b""),
        hex::encode(hex!(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        ))
    );
}

#[tokio::test]
async fn s2_one_block() {
    let keys = CombinedKey::from_bytes(&[0u8; 64]).unwrap();
    let frame = encrypt_frame(b"YELLOW SUBMARINE", &keys, [0u8; 16]).await;
    // 16 (IV) + 32 (two AES blocks: one real + one all-padding PKCS#7 block) + 32 (MAC)
    assert_eq!(frame.len(), 80);
}

#[tokio::test]
async fn s3_tampered_mac_is_rejected() {
    let keys = CombinedKey::from_bytes(&[1u8; 64]).unwrap();
    let plaintext = b"some attachment bytes";
    let mut frame = encrypt_frame(plaintext, &keys, [2u8; 16]).await;
    *frame.last_mut().unwrap() ^= 0x01;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.bin");
    tokio::fs::write(&path, &frame).await.unwrap();

    let (aes_key, mac_key) = attachment_cryptov2::split_keys(keys.as_bytes()).unwrap();
    let options = DecryptOptions {
        ciphertext_path: &path,
        id_for_logging: "s3",
        size: plaintext.len() as u64,
        aes_key,
        mac_key,
        integrity_mode: IntegrityMode::Local,
        outer_encryption: None,
    };
    let mut sink = Vec::new();
    let err = decrypt_attachment_v2_to_sink(options, &mut sink).await.unwrap_err();
    assert!(matches!(err, attachment_cryptov2::CryptoError::BadMac { .. }));
}

#[tokio::test]
async fn s4_wrong_digest_fails_after_mac_check_passes() {
    let keys = CombinedKey::from_bytes(&[3u8; 64]).unwrap();
    let plaintext = b"digest check";
    let frame = encrypt_frame(plaintext, &keys, [4u8; 16]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.bin");
    tokio::fs::write(&path, &frame).await.unwrap();

    let (aes_key, mac_key) = attachment_cryptov2::split_keys(keys.as_bytes()).unwrap();
    let wrong_digest = [0x99u8; 32];
    let options = DecryptOptions {
        ciphertext_path: &path,
        id_for_logging: "s4",
        size: plaintext.len() as u64,
        aes_key,
        mac_key,
        integrity_mode: IntegrityMode::Standard {
            their_digest: &wrong_digest,
        },
        outer_encryption: None,
    };
    let mut sink = Vec::new();
    let err = decrypt_attachment_v2_to_sink(options, &mut sink).await.unwrap_err();
    assert!(matches!(err, attachment_cryptov2::CryptoError::BadDigest { .. }));
    // A correct MAC was required to reach the digest check at all: the
    // plaintext made it all the way through decryption before comparison.
    assert!(!sink.is_empty());
}

#[tokio::test]
async fn s5_backup_reencrypt_digest_match_and_mismatch() {
    common::init_tracing();
    let keys = CombinedKey::from_bytes(&[5u8; 64]).unwrap();
    let plaintext = b"backed up attachment";
    let iv = [6u8; 16];

    let original = encrypt_attachment_v2(
        PlaintextSource::InMemory(plaintext.to_vec()),
        &keys,
        Some(DangerousIv::test(iv)),
        true,
        None,
        &NoPadding,
    )
    .await
    .unwrap();
    let digest = original.digest;

    let matching = encrypt_attachment_v2(
        PlaintextSource::InMemory(plaintext.to_vec()),
        &keys,
        Some(DangerousIv::reencrypting_for_backup(iv, &digest).unwrap()),
        true,
        None,
        &NoPadding,
    )
    .await
    .unwrap();
    assert_eq!(matching.digest, digest);

    let different_iv = [7u8; 16];
    let err = encrypt_attachment_v2(
        PlaintextSource::InMemory(plaintext.to_vec()),
        &keys,
        Some(
            DangerousIv::reencrypting_for_backup(different_iv, &digest).unwrap(),
        ),
        true,
        None,
        &NoPadding,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        attachment_cryptov2::CryptoError::ReencryptedDigestMismatch { .. }
    ));
}

#[tokio::test]
async fn s6_outer_layer_wraps_and_unwraps() {
    let inner_keys = CombinedKey::from_bytes(&[8u8; 64]).unwrap();
    let plaintext = b"wrapped for a backup fetch";
    let inner_frame = encrypt_frame(plaintext, &inner_keys, [9u8; 16]).await;

    let outer_keys = CombinedKey::from_bytes(&[10u8; 64]).unwrap();
    let mut outer_frame = Vec::new();
    encrypt_attachment_v2(
        PlaintextSource::InMemory(inner_frame),
        &outer_keys,
        Some(DangerousIv::test([11u8; 16])),
        true,
        Some(&mut outer_frame),
        &NoPadding,
    )
    .await
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outer.bin");
    tokio::fs::write(&path, &outer_frame).await.unwrap();

    let (inner_aes, inner_mac) = attachment_cryptov2::split_keys(inner_keys.as_bytes()).unwrap();
    let (outer_aes, outer_mac) = attachment_cryptov2::split_keys(outer_keys.as_bytes()).unwrap();

    let options = DecryptOptions {
        ciphertext_path: &path,
        id_for_logging: "s6",
        size: plaintext.len() as u64,
        aes_key: inner_aes,
        mac_key: inner_mac,
        integrity_mode: IntegrityMode::Local,
        outer_encryption: Some((outer_aes, outer_mac)),
    };
    let mut sink = Vec::new();
    let result = decrypt_attachment_v2_to_sink(options, &mut sink).await.unwrap();
    assert_eq!(sink, plaintext);
    assert_eq!(
        result.plaintext_hash,
        get_plaintext_hash_for_in_memory_attachment(plaintext)
    );

    // Flip a byte in the outer MAC (the very last byte of the outer frame).
    let mut tampered_outer = tokio::fs::read(&path).await.unwrap();
    *tampered_outer.last_mut().unwrap() ^= 0x01;
    tokio::fs::write(&path, &tampered_outer).await.unwrap();

    let (inner_aes, inner_mac) = attachment_cryptov2::split_keys(inner_keys.as_bytes()).unwrap();
    let (outer_aes, outer_mac) = attachment_cryptov2::split_keys(outer_keys.as_bytes()).unwrap();
    let options = DecryptOptions {
        ciphertext_path: &path,
        id_for_logging: "s6-tampered",
        size: plaintext.len() as u64,
        aes_key: inner_aes,
        mac_key: inner_mac,
        integrity_mode: IntegrityMode::Local,
        outer_encryption: Some((outer_aes, outer_mac)),
    };
    let mut sink = Vec::new();
    let err = decrypt_attachment_v2_to_sink(options, &mut sink).await.unwrap_err();
    assert!(matches!(
        err,
        attachment_cryptov2::CryptoError::BadOuterMac { .. }
    ));
}

/// A byte flipped inside the outer *ciphertext* (rather than the trailing
/// MAC) also fails the outer MAC check, but additionally corrupts the final
/// PKCS#7 block often enough that the outer unpad itself errors out. Both
/// paths must surface as `BadOuterMac`, never `Internal`.
#[tokio::test]
async fn s6_tampered_outer_ciphertext_byte_is_rejected() {
    let inner_keys = CombinedKey::from_bytes(&[12u8; 64]).unwrap();
    let plaintext = b"wrapped for a backup fetch, ciphertext tamper case";
    let inner_frame = encrypt_frame(plaintext, &inner_keys, [13u8; 16]).await;

    let outer_keys = CombinedKey::from_bytes(&[14u8; 64]).unwrap();
    let mut outer_frame = Vec::new();
    encrypt_attachment_v2(
        PlaintextSource::InMemory(inner_frame),
        &outer_keys,
        Some(DangerousIv::test([15u8; 16])),
        true,
        Some(&mut outer_frame),
        &NoPadding,
    )
    .await
    .unwrap();

    // Flip a byte in the final outer ciphertext block (the PKCS#7 padding
    // block, immediately before the trailing MAC), not the MAC itself.
    let mac_start = outer_frame.len() - 32;
    outer_frame[mac_start - 1] ^= 0x01;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outer-tampered.bin");
    tokio::fs::write(&path, &outer_frame).await.unwrap();

    let (inner_aes, inner_mac) = attachment_cryptov2::split_keys(inner_keys.as_bytes()).unwrap();
    let (outer_aes, outer_mac) = attachment_cryptov2::split_keys(outer_keys.as_bytes()).unwrap();
    let options = DecryptOptions {
        ciphertext_path: &path,
        id_for_logging: "s6-ciphertext-tampered",
        size: plaintext.len() as u64,
        aes_key: inner_aes,
        mac_key: inner_mac,
        integrity_mode: IntegrityMode::Local,
        outer_encryption: Some((outer_aes, outer_mac)),
    };
    let mut sink = Vec::new();
    let err = decrypt_attachment_v2_to_sink(options, &mut sink).await.unwrap_err();
    assert!(matches!(
        err,
        attachment_cryptov2::CryptoError::BadOuterMac { .. }
    ));
}
