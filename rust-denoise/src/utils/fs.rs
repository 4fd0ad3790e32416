//! Filesystem helpers shared across modules.
//!
//! These helpers attach the operation and path to IO errors so failures in a
//! job's workspace are reported with enough context to act on.

use std::path::Path;

use crate::{Error, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all_with_op(op: &'static str, path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io_path(op, path, e))
}

/// Blocking variant of [`ensure_dir_all_with_op`] for use before the runtime
/// is doing real work (logging setup).
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path(op, path, e))
}

/// Write `contents` to `path`, replacing any existing file.
pub async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Error::io_path("writing", path, e))
}

/// Read a whole file into memory.
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::io_path("reading", path, e))
}

/// Whether `path` exists. Errors other than "not found" are propagated.
pub async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io_path("checking", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        write_file(&path, b"abc").await.unwrap();
        assert!(exists(&path).await.unwrap());
        assert_eq!(read_file(&path).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn read_missing_file_has_path_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.pcm");
        let err = read_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("missing.pcm"));
        assert!(!exists(&path).await.unwrap());
    }
}
