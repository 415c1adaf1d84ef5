//! Error taxonomy for the attachment crypto engine.
//!
//! All public operations return [`CryptoError`]. Context (an opaque
//! `id_for_logging` plus, where relevant, the path involved) is attached to
//! every IO and integrity variant so a caller can correlate a failure with a
//! specific attachment without the error itself carrying key material or
//! plaintext bytes.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Diagnostic context attached to an error: never contains keys or plaintext.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub id_for_logging: Option<String>,
    pub path: Option<PathBuf>,
}

impl ErrorContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id_for_logging = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref id) = self.id_for_logging {
            parts.push(format!("id '{id}'"));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("at {:?}", path.display()));
        }
        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// The error kinds named in the engine's specification, abstractly: a caller
/// sees one of these plus a diagnostic message, never key material or
/// plaintext.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A combined key was not exactly `KEY_SET_LENGTH` bytes.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// An IV was not exactly `IV_LENGTH` bytes.
    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    /// A `digestToMatch` was not exactly `DIGEST_LENGTH` bytes.
    #[error("invalid digest length: expected {expected}, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    /// A `dangerousIv`/`dangerousTestOnlySkipPadding` escape hatch was used
    /// outside a trusted test environment.
    #[error("test-only feature used outside a test environment for {context}")]
    TestOnlyFeatureUsed { context: ErrorContext },

    /// The inner HMAC tag did not match.
    #[error("MAC verification failed for {context}")]
    BadMac { context: ErrorContext },

    /// The outer HMAC tag did not match.
    #[error("outer MAC verification failed for {context}")]
    BadOuterMac { context: ErrorContext },

    /// The frame digest did not match the caller-supplied `theirDigest`.
    #[error("digest verification failed for {context}")]
    BadDigest { context: ErrorContext },

    /// The digest produced while re-encrypting for backup did not match the
    /// digest the caller asked to reproduce.
    #[error("re-encrypted digest does not match the requested digest for {context}")]
    ReencryptedDigestMismatch { context: ErrorContext },

    /// The ciphertext frame was shorter than `IV_LENGTH + MAC_LENGTH`.
    #[error("truncated frame for {context}: expected at least {expected} bytes, got {actual}")]
    TruncatedFrame {
        expected: usize,
        actual: usize,
        context: ErrorContext,
    },

    /// Failed to open a file for reading or writing.
    #[error("failed to open {context}: {source}")]
    IoOpen {
        #[source]
        source: io::Error,
        context: ErrorContext,
    },

    /// Failed while reading from a file or stream.
    #[error("read error for {context}: {source}")]
    IoRead {
        #[source]
        source: io::Error,
        context: ErrorContext,
    },

    /// Failed while writing to a file or stream.
    #[error("write error for {context}: {source}")]
    IoWrite {
        #[source]
        source: io::Error,
        context: ErrorContext,
    },

    /// Failed to unlink a partial output file during cleanup (not raised for
    /// `NotFound`, which is swallowed silently).
    #[error("failed to unlink partial output for {context}: {source}")]
    IoUnlink {
        #[source]
        source: io::Error,
        context: ErrorContext,
    },

    /// An externally-originated cancellation tore down the pipeline. Never
    /// logged by the engine: the caller initiated this, it is not a failure.
    #[error("operation aborted for {context}")]
    Aborted { context: ErrorContext },

    /// An internal invariant was violated (e.g. a finalized hash had the
    /// wrong size). Indicates a bug in this crate, not caller misuse.
    #[error("internal invariant violated: {reason}")]
    Internal { reason: String },
}

impl CryptoError {
    #[must_use]
    pub fn io_open(source: io::Error, context: ErrorContext) -> Self {
        Self::IoOpen { source, context }
    }

    #[must_use]
    pub fn io_read(source: io::Error, context: ErrorContext) -> Self {
        Self::IoRead { source, context }
    }

    #[must_use]
    pub fn io_write(source: io::Error, context: ErrorContext) -> Self {
        Self::IoWrite { source, context }
    }

    #[must_use]
    pub fn io_unlink(source: io::Error, context: ErrorContext) -> Self {
        Self::IoUnlink { source, context }
    }

    /// Whether this error is one of the four integrity-failure kinds, which
    /// are intentionally indistinguishable in severity to the caller.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::BadMac { .. }
                | Self::BadOuterMac { .. }
                | Self::BadDigest { .. }
                | Self::ReencryptedDigestMismatch { .. }
        )
    }

    /// Logs this error at the appropriate level unless it is [`CryptoError::Aborted`],
    /// which per the propagation policy is re-raised without logging.
    pub fn log(&self) {
        if matches!(self, Self::Aborted { .. }) {
            return;
        }
        tracing::error!(error = %self, "attachment crypto operation failed");
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
