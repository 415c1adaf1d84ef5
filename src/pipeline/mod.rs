//! Stream primitives (component C2): small, independently testable
//! encode/decode steps composed by [`crate::encrypt`], [`crate::decrypt`],
//! and [`crate::reencrypt`] into the encrypt and decrypt pipelines described
//! in the frame layout.
//!
//! Each stage is a concrete struct with an `update`/`finish` pair rather
//! than a generic combinator, following this codebase's existing chunked
//! reader/writer style (see `CbcEncryptStage`/`CbcDecryptStage` for the two
//! stages that need real block-cipher chaining state).
//!
//! Encrypt pipeline (source to sink):
//! `peekAndUpdateHash -> appendPadding -> aesCbcEncrypt(iv) -> prependIv ->
//! appendMacStream -> peekDigest -> measureSize -> sink`
//!
//! Decrypt pipeline (source to sink):
//! `[outer layer, if present] -> peekDigest -> getMacAndUpdateHmac ->
//! getIvAndDecipher -> trimPadding(size) -> peekAndUpdateHash -> finalizer`
//!
//! `finalStream` has no struct of its own: it is the point in the decrypt
//! driver where the three constant-time comparisons (MAC, digest, outer MAC)
//! happen, modeled on `ct_eq`-based verification elsewhere in this codebase.

mod cbc;
mod stages;

pub use cbc::{CbcDecryptStage, CbcEncryptStage};
pub use stages::{
    HashTap, IvPrepend, MacAppender, MacSplitter, NoPadding, PadTarget, Padder, PaddingTrimmer,
    PowerOfTwoBucketPadding, SizeMeter,
};
