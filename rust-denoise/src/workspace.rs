//! Per-job scratch directories.
//!
//! Every job gets its own [`Workspace`], a uniquely named directory holding the
//! job's intermediate artifacts. The directory and everything under it is
//! removed when the workspace is closed or dropped, whichever comes first.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::utils::fs;
use crate::{Error, Result};

const WORKSPACE_PREFIX: &str = "denoise-";

/// Longest file extension carried over from a request into the workspace.
const MAX_EXTENSION_LEN: usize = 8;

/// Exclusive scratch area for one job.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Allocate a fresh workspace, under `root` when given or the system
    /// temporary directory otherwise.
    pub async fn open(root: Option<&Path>) -> Result<Self> {
        let parent = match root {
            Some(root) => {
                fs::ensure_dir_all_with_op("creating scratch root", root).await?;
                root.to_path_buf()
            }
            None => std::env::temp_dir(),
        };

        let dir = tokio::task::spawn_blocking({
            let parent = parent.clone();
            move || {
                tempfile::Builder::new()
                    .prefix(WORKSPACE_PREFIX)
                    .tempdir_in(parent)
            }
        })
        .await
        .map_err(|e| Error::Other(format!("Workspace setup task failed: {e}")))?
        .map_err(|e| Error::io_path("creating workspace in", &parent, e))?;

        debug!(path = %dir.path().display(), "Opened workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the job's input is materialized.
    ///
    /// The declared extension is kept so the pipeline can recognise raw PCM.
    /// Extensions that are not short and alphanumeric are dropped.
    pub fn input_path(&self, extension: Option<&str>) -> PathBuf {
        match extension.filter(|ext| is_safe_extension(ext)) {
            Some(ext) => self.path().join(format!("input.{ext}")),
            None => self.path().join("input"),
        }
    }

    /// Decoded 16-bit / 48 kHz / mono PCM.
    pub fn normalized_path(&self) -> PathBuf {
        self.path().join("normalized.pcm")
    }

    pub fn denoised_path(&self) -> PathBuf {
        self.path().join("denoised.pcm")
    }

    pub fn encoded_path(&self, extension: &str) -> PathBuf {
        self.path().join(format!("encoded.{extension}"))
    }

    /// Destination for a model fetched from remote storage.
    pub fn model_path(&self) -> PathBuf {
        self.path().join("model.bin")
    }

    /// Remove the workspace now and report whether that succeeded.
    ///
    /// Removal runs on the blocking pool. If this is never called the
    /// directory is still removed on drop, and errors are lost.
    pub async fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        let dir = self.dir;

        tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(|e| Error::Other(format!("Workspace cleanup task failed: {e}")))?
            .map_err(|e| Error::io_path("removing workspace", &path, e))?;

        debug!(path = %path.display(), "Closed workspace");
        Ok(())
    }
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn workspaces_are_unique_and_removed_on_close() {
        let root = TempDir::new().unwrap();
        let a = Workspace::open(Some(root.path())).await.unwrap();
        let b = Workspace::open(Some(root.path())).await.unwrap();
        assert_ne!(a.path(), b.path());

        tokio::fs::write(a.denoised_path(), b"pcm").await.unwrap();
        let a_path = a.path().to_path_buf();
        a.close().await.unwrap();
        assert!(!a_path.exists());
        assert!(b.path().exists());
    }

    #[tokio::test]
    async fn close_reports_removal_failure() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::open(Some(root.path())).await.unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();

        let err = ws.close().await.unwrap_err();
        assert!(matches!(err, Error::IoPath { op: "removing workspace", .. }));
    }

    #[tokio::test]
    async fn dropped_workspace_is_removed() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::open(Some(root.path())).await.unwrap();
            tokio::fs::write(ws.input_path(Some("wav")), b"data")
                .await
                .unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn creates_missing_scratch_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        let ws = Workspace::open(Some(&nested)).await.unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn input_path_keeps_only_safe_extensions() {
        let ws = Workspace::open(None).await.unwrap();
        assert_eq!(ws.input_path(Some("pcm")), ws.path().join("input.pcm"));
        assert_eq!(ws.input_path(None), ws.path().join("input"));
        assert_eq!(ws.input_path(Some("../etc")), ws.path().join("input"));
        assert_eq!(ws.input_path(Some("")), ws.path().join("input"));
        assert_eq!(
            ws.input_path(Some("averyverylongext")),
            ws.path().join("input")
        );
    }
}
