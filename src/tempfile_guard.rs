//! Temp-file guard (component C6): every file-producing entry point writes
//! to a temp file beside its destination and only makes the result visible
//! via an atomic rename, unlinking the temp file on any failure.
//!
//! Grounded on `oxidized-cryptolib::fs::streaming::VaultFileWriter::{finish,
//! abort, Drop}` and `oxidized-cryptolib::vault::operations_async::safe_write`:
//! create-before-run, unlink-on-any-error (swallowing `NotFound`), rename on
//! success, and a `Drop` safety net that cleans up (and logs) if neither path
//! was taken.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use rand::RngCore;
use tokio::fs;

use crate::error::{CryptoError, ErrorContext, Result};

/// A temp file created beside `dest`, unlinked on `Drop` unless
/// [`Self::keep`] was called. Mirrors the teacher's `VaultFileWriter`
/// guard: a `finish()`/`abort()` pair backed by a `Drop` that does
/// best-effort synchronous cleanup if neither ran.
struct TempFileGuard {
    temp_path: PathBuf,
    kept: bool,
}

impl TempFileGuard {
    async fn create(dest: &Path) -> Result<(Self, fs::File)> {
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).await.map_err(|e| {
            CryptoError::io_open(e, ErrorContext::new().with_path(dir.to_path_buf()))
        })?;

        let mut random_suffix = [0u8; 16];
        rand::rng().fill_bytes(&mut random_suffix);
        let temp_name = format!(
            ".{}.tmp-{}",
            dest.file_name().and_then(|n| n.to_str()).unwrap_or("attachment"),
            hex::encode(random_suffix)
        );
        let temp_path = dir.join(temp_name);

        let file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(|e| CryptoError::io_open(e, ErrorContext::new().with_path(temp_path.clone())))?;

        Ok((
            Self {
                temp_path,
                kept: false,
            },
            file,
        ))
    }

    async fn commit(mut self, dest: &Path) -> Result<()> {
        fs::rename(&self.temp_path, dest).await.map_err(|e| {
            CryptoError::io_write(e, ErrorContext::new().with_path(dest.to_path_buf()))
        })?;
        self.kept = true;
        Ok(())
    }

    async fn abort(mut self) -> Result<()> {
        self.kept = true; // Drop must not also try to remove it.
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CryptoError::io_unlink(
                e,
                ErrorContext::new().with_path(self.temp_path.clone()),
            )),
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        let path = self.temp_path.clone();
        tracing::warn!(path = %path.display(), "temp attachment file dropped without finish/abort, cleaning up");
        let _ = std::fs::remove_file(&path);
    }
}

/// Runs `body` with a freshly created, exclusively-owned write handle to a
/// temp file beside `dest`. On success, atomically renames the temp file to
/// `dest`. On any failure (from `body` or from the rename itself), unlinks
/// the temp file and propagates the original error; an unlink failure that
/// is not `NotFound` is itself surfaced as a logged `IoUnlink` error.
pub async fn run_to_disk_guarded<'a, T, F>(dest: &Path, body: F) -> Result<T>
where
    F: FnOnce(fs::File) -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>,
{
    let (guard, file) = TempFileGuard::create(dest).await?;

    match body(file).await {
        Ok(value) => {
            guard.commit(dest).await?;
            Ok(value)
        }
        Err(original_err) => {
            if let Err(unlink_err) = guard.abort().await {
                unlink_err.log();
            }
            Err(original_err)
        }
    }
}
