//! Passthrough/accumulator stream stages that don't need block-cipher state:
//! hashing taps, size metering, the logical zero-padder/trimmer, IV framing,
//! and the MAC splitter/appender.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::constants::{IV_LENGTH, MAC_LENGTH};
use crate::error::{CryptoError, ErrorContext};

type HmacSha256 = Hmac<Sha256>;

/// Decides how many bytes of logical zero-padding a plaintext of length `n`
/// should be padded up to. Implementations must be deterministic and must
/// return a value `>= n`; this crate does not mandate a particular bucketing
/// policy, it only needs one injected by the caller.
pub trait PadTarget: Send + Sync {
    fn target(&self, n: u64) -> u64;
}

/// Adds no logical padding: `target(n) == n`. Useful for callers (and tests)
/// that only care about the PKCS#7/frame-level padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPadding;

impl PadTarget for NoPadding {
    fn target(&self, n: u64) -> u64 {
        n
    }
}

/// Pads up to the next power-of-two bucket, with a minimum bucket size of
/// 512 bytes. A reasonable default bucketing scheme; callers with a
/// different padding policy supply their own `PadTarget`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerOfTwoBucketPadding;

impl PadTarget for PowerOfTwoBucketPadding {
    fn target(&self, n: u64) -> u64 {
        const MIN_BUCKET: u64 = 512;
        if n <= MIN_BUCKET {
            return MIN_BUCKET;
        }
        let mut bucket = MIN_BUCKET;
        while bucket < n {
            bucket *= 2;
        }
        bucket
    }
}

/// A passthrough stage that feeds every byte it sees into a running
/// SHA-256 hash, without altering the stream. Used both for `peekDigest`
/// (over the whole ciphertext frame) and `peekAndUpdateHash` (over the
/// unpadded plaintext).
#[derive(Default)]
pub struct HashTap {
    hasher: Sha256,
}

impl HashTap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    #[must_use]
    pub fn finish(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

/// A passthrough stage that counts the total number of bytes seen.
/// `measureSize` in the spec: used to compute `ciphertextSize`.
#[derive(Default)]
pub struct SizeMeter {
    total: u64,
}

impl SizeMeter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.total += data.len() as u64;
    }

    #[must_use]
    pub fn finish(self) -> u64 {
        self.total
    }
}

/// Appends zero bytes at the end of a plaintext stream to reach
/// `pad_target.target(n)`, where `n` is the number of plaintext bytes seen.
/// This is the *logical* padding layer, independent of and upstream of the
/// real PKCS#7 block padding applied by [`super::cbc::CbcEncryptStage`].
pub struct Padder<'a> {
    pad_target: &'a dyn PadTarget,
    seen: u64,
}

impl<'a> Padder<'a> {
    pub fn new(pad_target: &'a dyn PadTarget) -> Self {
        Self { pad_target, seen: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.seen += data.len() as u64;
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        let target = self.pad_target.target(self.seen);
        let pad_len = target.saturating_sub(self.seen);
        vec![0u8; pad_len as usize]
    }
}

/// Emits only the first `declared_size` bytes of whatever it is fed,
/// silently discarding everything after. On the decrypt side this is the
/// sole mechanism that removes both the logical zero-padding and the
/// PKCS#7 trailer left behind by `getIvAndDecipher` — see that stage's doc
/// comment for why it doesn't strip PKCS#7 itself.
///
/// Trusts the caller-declared size completely: an oversized `declared_size`
/// silently leaves padding bytes in the output instead of failing.
pub struct PaddingTrimmer {
    declared_size: u64,
    emitted: u64,
}

impl PaddingTrimmer {
    #[must_use]
    pub fn new(declared_size: u64) -> Self {
        Self {
            declared_size,
            emitted: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        if self.emitted >= self.declared_size {
            return Vec::new();
        }
        let remaining = (self.declared_size - self.emitted) as usize;
        let take = remaining.min(data.len());
        self.emitted += take as u64;
        data[..take].to_vec()
    }
}

/// Prepends the IV to the first chunk written, then passes everything else
/// through unchanged. `prependIv` in the spec.
pub struct IvPrepend {
    iv: Option<[u8; IV_LENGTH]>,
}

impl IvPrepend {
    #[must_use]
    pub fn new(iv: [u8; IV_LENGTH]) -> Self {
        Self { iv: Some(iv) }
    }

    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + IV_LENGTH);
        if let Some(iv) = self.iv.take() {
            out.extend_from_slice(&iv);
        }
        out.extend_from_slice(data);
        out
    }

    /// Emits the IV alone, for the degenerate case of an empty stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.iv.take().map(|iv| iv.to_vec()).unwrap_or_default()
    }
}

/// Computes an HMAC-SHA256 tag over everything it is fed and appends it on
/// `finish`. `appendMacStream(macKey)` in the spec.
pub struct MacAppender {
    mac: HmacSha256,
}

impl MacAppender {
    pub fn new(mac_key: &[u8; 32]) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(mac_key)
                .expect("HMAC-SHA256 accepts any key length"),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    #[must_use]
    pub fn finish(self) -> [u8; MAC_LENGTH] {
        self.mac.finalize().into_bytes().into()
    }
}

/// Splits a trailing MAC tag off an IV||ciphertext||MAC stream while feeding
/// everything *except* the tag into a running HMAC, for later comparison
/// against the tag. `getMacAndUpdateHmac(macKey)` in the spec.
///
/// Implemented by holding back the last `MAC_LENGTH` bytes seen so far,
/// since the stream's total length (and hence where the tag begins) is not
/// known until end-of-stream.
pub struct MacSplitter {
    mac: HmacSha256,
    held: Vec<u8>,
}

impl MacSplitter {
    pub fn new(mac_key: &[u8; 32]) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(mac_key)
                .expect("HMAC-SHA256 accepts any key length"),
            held: Vec::with_capacity(MAC_LENGTH * 2),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> Vec<u8> {
        self.held.extend_from_slice(data);
        if self.held.len() <= MAC_LENGTH {
            return Vec::new();
        }
        let emit_len = self.held.len() - MAC_LENGTH;
        let emitted: Vec<u8> = self.held.drain(..emit_len).collect();
        self.mac.update(&emitted);
        emitted
    }

    /// Returns the computed HMAC over the passed-through bytes and the
    /// trailing tag the stream actually carried, for the caller to compare
    /// in constant time.
    pub fn finish(self, context: ErrorContext) -> Result<([u8; MAC_LENGTH], [u8; MAC_LENGTH]), CryptoError> {
        if self.held.len() != MAC_LENGTH {
            return Err(CryptoError::TruncatedFrame {
                expected: MAC_LENGTH,
                actual: self.held.len(),
                context,
            });
        }
        let mut their_mac = [0u8; MAC_LENGTH];
        their_mac.copy_from_slice(&self.held);
        let computed: [u8; MAC_LENGTH] = self.mac.finalize().into_bytes().into();
        Ok((computed, their_mac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_bucket_padding_rounds_up() {
        let p = PowerOfTwoBucketPadding;
        assert_eq!(p.target(0), 512);
        assert_eq!(p.target(512), 512);
        assert_eq!(p.target(513), 1024);
        assert_eq!(p.target(1_000_000), 1_048_576);
    }

    #[test]
    fn no_padding_is_identity() {
        assert_eq!(NoPadding.target(12345), 12345);
    }

    #[test]
    fn padder_emits_zero_bytes_up_to_target() {
        let pad = NoPadding;
        let mut padder = Padder::new(&pad);
        padder.update(b"hello");
        assert_eq!(padder.finish(), Vec::<u8>::new());

        let bucket = PowerOfTwoBucketPadding;
        let mut padder = Padder::new(&bucket);
        padder.update(&[0u8; 10]);
        assert_eq!(padder.finish().len(), 502);
    }

    #[test]
    fn padding_trimmer_cuts_at_declared_size() {
        let mut trimmer = PaddingTrimmer::new(5);
        let mut out = trimmer.update(b"hello world, extra padding bytes here");
        assert_eq!(out.len(), 5);
        out.extend(trimmer.update(b"more"));
        assert_eq!(out, b"hello");
    }

    #[test]
    fn padding_trimmer_handles_chunk_boundaries() {
        let mut trimmer = PaddingTrimmer::new(3);
        let mut out = Vec::new();
        out.extend(trimmer.update(b"a"));
        out.extend(trimmer.update(b"b"));
        out.extend(trimmer.update(b"c"));
        out.extend(trimmer.update(b"d"));
        assert_eq!(out, b"abc");
    }

    #[test]
    fn iv_prepend_only_happens_once() {
        let mut stage = IvPrepend::new([7u8; IV_LENGTH]);
        let first = stage.update(b"data1");
        assert_eq!(&first[..IV_LENGTH], &[7u8; IV_LENGTH]);
        assert_eq!(&first[IV_LENGTH..], b"data1");
        let second = stage.update(b"data2");
        assert_eq!(second, b"data2");
    }

    #[test]
    fn mac_splitter_holds_back_exactly_the_tag() {
        let key = [1u8; 32];
        let mut appender = MacAppender::new(&key);
        appender.update(b"hello world");
        let tag = appender.finish();

        let mut framed = b"hello world".to_vec();
        framed.extend_from_slice(&tag);

        let mut splitter = MacSplitter::new(&key);
        let mut passthrough = Vec::new();
        for chunk in framed.chunks(4) {
            passthrough.extend(splitter.update(chunk));
        }
        assert_eq!(passthrough, b"hello world");
        let (computed, theirs) = splitter.finish(ErrorContext::new()).unwrap();
        assert_eq!(computed, theirs);
        assert_eq!(theirs, tag);
    }

    #[test]
    fn mac_splitter_rejects_short_stream() {
        let splitter = MacSplitter::new(&[0u8; 32]);
        let err = splitter.finish(ErrorContext::new()).unwrap_err();
        assert!(matches!(err, CryptoError::TruncatedFrame { .. }));
    }

    #[test]
    fn hash_tap_matches_sha256_of_full_input() {
        let mut tap = HashTap::new();
        tap.update(b"hello ");
        tap.update(b"world");
        let digest = tap.finish();
        let expected = Sha256::digest(b"hello world");
        assert_eq!(digest.as_slice(), expected.as_slice());
    }

    #[test]
    fn size_meter_counts_all_bytes() {
        let mut meter = SizeMeter::new();
        meter.update(b"abc");
        meter.update(b"de");
        assert_eq!(meter.finish(), 5);
    }
}
